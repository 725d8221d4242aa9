use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::plugin_system::capability::CapabilityFlags;
use crate::ui_bridge::{MenuItemId, ToolId};

/// A GNSS position fix as reported by the host's navigation data layer.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PositionFix {
    pub lat: f64,
    pub lon: f64,
    /// Course over ground, degrees true.
    pub cog: f64,
    /// Speed over ground, knots.
    pub sog: f64,
    /// Magnetic variation, degrees.
    pub var: f64,
    pub hdm: f64,
    pub hdt: f64,
    /// Seconds since the Unix epoch.
    pub fix_time: i64,
    pub n_sats: i32,
}

/// Navigation state of the currently active route leg.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ActiveLeg {
    /// Cross-track error, nautical miles.
    pub xte: f64,
    /// Bearing to waypoint.
    pub btw: f64,
    /// Distance to waypoint.
    pub dtw: f64,
    pub wp_to: String,
    pub arrival: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ViewPort {
    pub clat: f64,
    pub clon: f64,
    pub view_scale_ppm: f64,
    pub skew: f64,
    pub rotation: f64,
    pub pix_width: i32,
    pub pix_height: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ColorScheme {
    Rgb,
    #[default]
    Day,
    Dusk,
    Night,
}

impl ColorScheme {
    pub fn code(self) -> i32 {
        match self {
            ColorScheme::Rgb => 0,
            ColorScheme::Day => 1,
            ColorScheme::Dusk => 2,
            ColorScheme::Night => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MouseEvent {
    pub x: i32,
    pub y: i32,
    /// Bitmask of pressed buttons: 1 left, 2 right, 4 middle.
    pub buttons: u32,
    pub wheel: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeyEvent {
    pub key_code: i32,
    pub modifiers: u32,
    pub pressed: bool,
}

/// Everything the host can route to plugins.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    PositionFix(PositionFix),
    ActiveLeg(ActiveLeg),
    NmeaSentence(String),
    AisSentence(String),
    CursorLatLon { lat: f64, lon: f64 },
    Viewport(ViewPort),
    Resize { width: i32, height: i32 },
    ColorScheme(ColorScheme),
    JsonMessage { id: String, payload: Value },
    ToolbarToolActivated(ToolId),
    ContextMenuItemActivated(MenuItemId),
    Mouse(MouseEvent),
    Key(KeyEvent),
    RenderOverlay { canvas_index: u32, viewport: ViewPort },
    SetupOptions,
}

impl HostEvent {
    pub fn name(&self) -> &'static str {
        match self {
            HostEvent::PositionFix(_) => "position_fix",
            HostEvent::ActiveLeg(_) => "active_leg",
            HostEvent::NmeaSentence(_) => "nmea_sentence",
            HostEvent::AisSentence(_) => "ais_sentence",
            HostEvent::CursorLatLon { .. } => "cursor_lat_lon",
            HostEvent::Viewport(_) => "viewport",
            HostEvent::Resize { .. } => "resize",
            HostEvent::ColorScheme(_) => "color_scheme",
            HostEvent::JsonMessage { .. } => "json_message",
            HostEvent::ToolbarToolActivated(_) => "toolbar_tool",
            HostEvent::ContextMenuItemActivated(_) => "context_menu_item",
            HostEvent::Mouse(_) => "mouse",
            HostEvent::Key(_) => "key",
            HostEvent::RenderOverlay { .. } => "render_overlay",
            HostEvent::SetupOptions => "setup_options",
        }
    }

    /// The flag a plugin must declare to receive this event. `None` means
    /// every active plugin receives it.
    pub fn required_capability(&self) -> Option<CapabilityFlags> {
        match self {
            HostEvent::PositionFix(_) | HostEvent::ActiveLeg(_) => Some(CapabilityFlags::NMEA_EVENTS),
            HostEvent::NmeaSentence(_) => Some(CapabilityFlags::NMEA_SENTENCES),
            HostEvent::AisSentence(_) => Some(CapabilityFlags::AIS_SENTENCES),
            HostEvent::CursorLatLon { .. } => Some(CapabilityFlags::CURSOR_LATLON),
            HostEvent::Viewport(_) | HostEvent::Resize { .. } => Some(CapabilityFlags::ONPAINT_VIEWPORT),
            HostEvent::JsonMessage { .. } => Some(CapabilityFlags::PLUGIN_MESSAGING),
            HostEvent::ToolbarToolActivated(_) => Some(CapabilityFlags::TOOLBAR_CALLBACK),
            HostEvent::ContextMenuItemActivated(_) => Some(CapabilityFlags::INSTALLS_CONTEXTMENU_ITEMS),
            HostEvent::Mouse(_) => Some(CapabilityFlags::MOUSE_EVENTS),
            HostEvent::Key(_) => Some(CapabilityFlags::KEYBOARD_EVENTS),
            HostEvent::RenderOverlay { .. } => Some(CapabilityFlags::OVERLAY_CALLBACK),
            HostEvent::ColorScheme(_) | HostEvent::SetupOptions => None,
        }
    }

    /// Input events stop at the first plugin that reports them handled.
    pub fn is_consumable(&self) -> bool {
        matches!(self, HostEvent::Mouse(_) | HostEvent::Key(_))
    }
}
