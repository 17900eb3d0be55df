use crate::models::PackageType;

/// Checked first. Any hit classifies the package as a GUI application.
pub const GUI_KEYWORDS: [&str; 18] = [
    "gui", "gtk", "qt", "x11", "desktop", "window", "display", "graphical", "visual", "image",
    "video", "audio", "media", "browser", "editor", "viewer", "player", "manager",
];

/// Checked only when no GUI keyword matched.
pub const CLI_KEYWORDS: [&str; 12] = [
    "cli", "command", "terminal", "console", "shell", "bash", "tool", "utility", "daemon",
    "service", "server", "client",
];

/// Classifies a package from its name and description.
///
/// Matching is a case-insensitive substring test over `"{name} {description}"`.
/// GUI keywords win over CLI keywords and the fallback is [`PackageType::Cli`].
pub fn classify(name: &str, description: Option<&str>) -> PackageType {
    let text = format!("{} {}", name, description.unwrap_or_default()).to_lowercase();

    if GUI_KEYWORDS.iter().any(|keyword| text.contains(keyword)) {
        return PackageType::Gui;
    }
    if CLI_KEYWORDS.iter().any(|keyword| text.contains(keyword)) {
        return PackageType::Cli;
    }

    PackageType::Cli
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gui_wins_over_cli() {
        assert_eq!(
            classify("image-viewer-cli-tool", Some("a viewer with a cli")),
            PackageType::Gui
        );
        assert_eq!(classify("mpv", Some("Command line video player")), PackageType::Gui);
    }

    #[test]
    fn test_cli_keywords() {
        assert_eq!(classify("curl", Some("command line tool for transferring data")), PackageType::Cli);
        assert_eq!(classify("openssh-server", None), PackageType::Cli);
    }

    #[test]
    fn test_default_is_cli() {
        assert_eq!(classify("foobar", Some("")), PackageType::Cli);
        assert_eq!(classify("foobar", None), PackageType::Cli);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(classify("FooBar", Some("A GTK Frontend")), PackageType::Gui);
    }
}
