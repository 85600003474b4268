use std::fmt;

/// A separately updatable part of the installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    Ui,
    Guard,
    Engine,
}

impl Component {
    /// Apply order. The engine goes last since applying it stops the
    /// running process.
    pub const ORDER: [Component; 3] = [Component::Ui, Component::Guard, Component::Engine];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ui => "ui",
            Self::Guard => "guard",
            Self::Engine => "engine",
        }
    }

    /// Dotted config key holding the installed version.
    pub fn version_key(self) -> &'static str {
        match self {
            Self::Ui => "frontend.version",
            Self::Guard => "guard.version",
            Self::Engine => "engine.version",
        }
    }

    /// Supervisor script swapping the binary, for process components.
    pub fn supervisor_script(self) -> Option<&'static str> {
        match self {
            Self::Ui => None,
            Self::Guard => Some("updateAndStopGuard.sh"),
            Self::Engine => Some("updateAndStopEngine.sh"),
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An update offered by the update service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailableUpdate {
    pub component: Component,
    pub url: String,
    pub version: String,
}
