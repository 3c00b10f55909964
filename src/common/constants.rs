//! Application-wide constants
//!
//! This module contains all magic numbers and string literals used throughout
//! the application, providing a single source of truth for constant values.

/// Configuration paths and filenames
pub mod config {
    /// Application directory name under XDG config
    pub const APP_DIR: &str = "display-layout-switcher";

    /// Configuration filename
    pub const FILENAME: &str = "settings.json";

    /// Environment variable that overrides the configuration directory
    pub const DIR_ENV_VAR: &str = "DISPLAY_LAYOUT_SWITCHER_CONFIG_DIR";

    /// Backup settings
    pub mod backup {
        /// Subdirectory (next to the config file) holding backup archives
        pub const SUBDIR: &str = "backups";

        /// Number of corrupt-config archives kept before pruning
        pub const CORRUPT_RETENTION: usize = 5;
    }
}

/// Monitor topology fingerprint encoding
pub mod fingerprint {
    /// Separator between encoded monitors
    pub const SEPARATOR: &str = "|";
}

/// Auto switcher timing
pub mod switcher {
    /// Quiet period after the last topology change before re-evaluating
    pub const DEBOUNCE_MS: u64 = 2000;

    /// Capacity of the fingerprint-observed broadcast channel
    pub const FINGERPRINT_CHANNEL_CAPACITY: usize = 16;
}

/// X11 topology listener
pub mod x11 {
    /// poll() timeout so the listener thread notices unsubscribe requests
    pub const LISTENER_POLL_TIMEOUT_MS: i32 = 250;
}

/// Layout engine (Rainmeter) file layout and command names
pub mod engine {
    /// Default engine install location on Windows
    pub const WINDOWS_EXECUTABLE: &str = r"C:\Program Files\Rainmeter\Rainmeter.exe";

    /// Engine install location inside a default wine prefix, relative to $HOME
    pub const WINE_EXECUTABLE: &str = ".wine/drive_c/Program Files/Rainmeter/Rainmeter.exe";

    /// Wrapper used to launch the engine outside Windows
    pub const WINE_LAUNCHER: &str = "wine";

    /// Engine data directory name under the per-user config/documents dirs
    pub const DATA_DIR: &str = "Rainmeter";

    /// Layouts directory name
    pub const LAYOUTS_DIR: &str = "Layouts";

    /// Skins directory name
    pub const SKINS_DIR: &str = "Skins";

    /// Master descriptor file inside each layout directory
    pub const LAYOUT_FILE: &str = "Rainmeter.ini";

    /// Section of the layout file that holds engine settings
    pub const ENGINE_SECTION: &str = "Rainmeter";

    /// Key in the engine section pointing at the skins root
    pub const SKIN_PATH_KEY: &str = "SkinPath";

    /// Key flagging a skin section as active
    pub const ACTIVE_KEY: &str = "Active";

    /// Value of `Active` for loaded skins
    pub const ACTIVE_VALUE: &str = "1";

    /// Section of a skin file holding its variable declarations
    pub const VARIABLES_SECTION: &str = "Variables";

    /// Prefix of include directives that appear as pseudo-variables
    pub const INCLUDE_PREFIX: &str = "@include";

    /// Extension of skin configuration files
    pub const SKIN_FILE_EXTENSION: &str = "ini";

    /// Drive wine maps to the host root filesystem
    pub const WINE_ROOT_DRIVE: &str = "Z:";

    /// Bang command names understood by the engine executable
    pub mod bang {
        pub const LOAD_LAYOUT: &str = "!LoadLayout";
        pub const WRITE_KEY_VALUE: &str = "!WriteKeyValue";
        pub const REFRESH: &str = "!Refresh";
    }
}

/// Desktop session integration
pub mod autostart {
    /// Directory under the XDG config dir holding autostart entries
    pub const DIR: &str = "autostart";

    /// Desktop entry filename
    pub const FILENAME: &str = "display-layout-switcher.desktop";
}
