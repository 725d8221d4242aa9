use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// The set of event categories a plugin declared interest in.
///
/// Bit values are part of the plugin ABI and must not change.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CapabilityFlags(u32);

impl CapabilityFlags {
    pub const NONE: Self = Self(0);
    pub const OVERLAY_CALLBACK: Self = Self(0x0000_0001);
    pub const CURSOR_LATLON: Self = Self(0x0000_0002);
    pub const TOOLBAR_CALLBACK: Self = Self(0x0000_0004);
    pub const INSTALLS_TOOLBAR_TOOL: Self = Self(0x0000_0008);
    pub const WANTS_CONFIG: Self = Self(0x0000_0010);
    pub const INSTALLS_TOOLBOX_PAGE: Self = Self(0x0000_0020);
    pub const INSTALLS_CONTEXTMENU_ITEMS: Self = Self(0x0000_0040);
    pub const NMEA_SENTENCES: Self = Self(0x0000_0080);
    /// Position fixes and active-leg information.
    pub const NMEA_EVENTS: Self = Self(0x0000_0100);
    pub const AIS_SENTENCES: Self = Self(0x0000_0200);
    pub const PREFERENCES: Self = Self(0x0000_0800);
    /// Viewport changes and parent resize notifications.
    pub const ONPAINT_VIEWPORT: Self = Self(0x0000_2000);
    pub const PLUGIN_MESSAGING: Self = Self(0x0000_4000);
    pub const LATE_INIT: Self = Self(0x0002_0000);
    pub const MOUSE_EVENTS: Self = Self(0x0008_0000);
    pub const KEYBOARD_EVENTS: Self = Self(0x0020_0000);

    const NAMED: [(Self, &'static str); 16] = [
        (Self::OVERLAY_CALLBACK, "overlay"),
        (Self::CURSOR_LATLON, "cursor"),
        (Self::TOOLBAR_CALLBACK, "toolbar-callback"),
        (Self::INSTALLS_TOOLBAR_TOOL, "toolbar"),
        (Self::WANTS_CONFIG, "config"),
        (Self::INSTALLS_TOOLBOX_PAGE, "toolbox"),
        (Self::INSTALLS_CONTEXTMENU_ITEMS, "context-menu"),
        (Self::NMEA_SENTENCES, "nmea"),
        (Self::NMEA_EVENTS, "position"),
        (Self::AIS_SENTENCES, "ais"),
        (Self::PREFERENCES, "preferences"),
        (Self::ONPAINT_VIEWPORT, "viewport"),
        (Self::PLUGIN_MESSAGING, "messaging"),
        (Self::LATE_INIT, "late-init"),
        (Self::MOUSE_EVENTS, "mouse"),
        (Self::KEYBOARD_EVENTS, "keyboard"),
    ];

    /// Unknown bits are kept; a newer plugin may declare interests this host
    /// does not route yet.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Short names of the known flags that are set.
    pub fn names(self) -> Vec<&'static str> {
        Self::NAMED
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }
}

impl BitOr for CapabilityFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for CapabilityFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for CapabilityFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CapabilityFlags({:#x}: {})", self.0, self.names().join("|"))
    }
}

impl fmt::Display for CapabilityFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "-")
        } else {
            write!(f, "{}", self.names().join(","))
        }
    }
}
