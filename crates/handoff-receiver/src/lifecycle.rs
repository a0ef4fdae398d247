//! Platform entry points. All three feed [`ShareReceiver::handle_activation`].

use crate::router::ShareReceiver;

/// A handoff/continuation record as delivered by the platform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserActivity {
    pub activity_type: String,
    pub webpage_url: Option<String>,
}

/// What the process was launched with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchOptions {
    pub url: Option<String>,
    pub user_activities: Vec<UserActivity>,
}

impl ShareReceiver {
    /// Cold launch. Prefers the launch url, then the first activity carrying a
    /// webpage url. A launch with neither is not an activation and leaves the
    /// channels untouched.
    pub fn on_launch(&mut self, options: &LaunchOptions) -> bool {
        let url = options.url.as_deref().or_else(|| {
            options
                .user_activities
                .iter()
                .find_map(|activity| activity.webpage_url.as_deref())
        });
        match url {
            Some(url) => self.handle_activation(Some(url), true),
            None => false,
        }
    }

    /// A signal delivered to the already running process.
    pub fn on_open_url(&mut self, url: &str) -> bool {
        self.handle_activation(Some(url), false)
    }

    /// Continuation of a platform-level handoff. Treated like a launch, so it
    /// fills the initial values when no cold start preceded it.
    pub fn on_continue_activity(&mut self, activity: &UserActivity) -> bool {
        self.handle_activation(activity.webpage_url.as_deref(), true)
    }
}
