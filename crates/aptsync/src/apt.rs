//! Rendering package-manager invocations

/// Default package manager.
pub const DEFAULT_APT_EXECUTABLE: &str = "/usr/bin/apt-get";

/// Default command used to hold packages.
pub const DEFAULT_HOLD_COMMAND: &str = "aptitude hold";

/// Dry-run option added to every invocation in simulate mode.
pub const SIMULATE_OPTION: &str = "-s";

/// How to invoke the package manager on a host
///
/// Renders `<executable> [options...] <subcommand> [packages...]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AptCommand {
    /// Package manager binary, e.g. `apt-get`
    pub executable: String,
    /// Extra options placed before the subcommand
    pub options: Vec<String>,
    /// Add `-s` so changes are only reported
    pub simulate: bool,
}

impl Default for AptCommand {
    fn default() -> Self {
        Self {
            executable: DEFAULT_APT_EXECUTABLE.to_string(),
            options: Vec::new(),
            simulate: false,
        }
    }
}

impl AptCommand {
    /// Invoke `executable` with no extra options.
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            ..Default::default()
        }
    }

    /// Replace the extra options.
    pub fn with_options(mut self, options: Vec<String>) -> Self {
        self.options = options;
        self
    }

    /// Turn simulate mode on or off.
    pub fn with_simulate(mut self, simulate: bool) -> Self {
        self.simulate = simulate;
        self
    }

    /// Shell command line for `subcommand` applied to `packages`
    pub fn render<S: AsRef<str>>(&self, subcommand: &str, packages: &[S]) -> String {
        let mut parts: Vec<&str> = vec![self.executable.as_str()];
        parts.extend(self.options.iter().map(String::as_str));
        if self.simulate {
            parts.push(SIMULATE_OPTION);
        }
        parts.push(subcommand);
        parts.extend(packages.iter().map(AsRef::as_ref));
        parts.retain(|p| !p.trim().is_empty());
        parts.join(" ")
    }
}

/// Shell command line holding `packages` with `hold_command`
///
/// Holding bypasses the apt executable and its options, simulate included.
pub fn render_hold<S: AsRef<str>>(hold_command: &str, packages: &[S]) -> String {
    let mut parts = vec![hold_command.trim()];
    parts.extend(packages.iter().map(AsRef::as_ref));
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_plain_subcommand() {
        let apt = AptCommand::default();
        assert_eq!(apt.render::<&str>("update", &[]), "/usr/bin/apt-get update");
    }

    #[test]
    fn test_render_with_options_and_packages() {
        let apt = AptCommand::new("aptitude").with_options(vec!["-y".into(), "-q".into()]);
        assert_eq!(
            apt.render("install", &["vim", "git"]),
            "aptitude -y -q install vim git"
        );
    }

    #[test]
    fn test_simulate_adds_dry_run_before_subcommand() {
        let apt = AptCommand::default()
            .with_options(vec!["-y".into()])
            .with_simulate(true);
        assert_eq!(
            apt.render("remove", &["nano".to_string()]),
            "/usr/bin/apt-get -y -s remove nano"
        );
    }

    #[test]
    fn test_empty_options_leave_no_stray_spaces() {
        let apt = AptCommand::default().with_options(vec![String::new()]);
        assert_eq!(apt.render::<&str>("clean", &[]), "/usr/bin/apt-get clean");
    }

    #[test]
    fn test_render_hold() {
        assert_eq!(
            render_hold(DEFAULT_HOLD_COMMAND, &["linux-image", "grub-pc"]),
            "aptitude hold linux-image grub-pc"
        );
    }
}
