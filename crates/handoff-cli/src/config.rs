use clap::Args;
use handoff_core::group_identifier;
use std::path::PathBuf;

pub const DEFAULT_APP_ID: &str = "com.kasem.sharing";
pub const DEFAULT_SCHEME: &str = "SharePhotos";
pub const DEFAULT_SHARE_KEY: &str = "ShareKey";
pub const STORE_FILE_NAME: &str = "shared.sqlite3";

/// Flags shared by every subcommand. Empty means "fall back to the environment".
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    #[arg(long, global = true, default_value = "")]
    pub app_id: String,
    #[arg(long, global = true, default_value = "")]
    pub group_dir: String,
    #[arg(long, global = true, default_value = "")]
    pub scheme: String,
    #[arg(long, global = true, default_value = "")]
    pub key: String,
    #[arg(long, global = true, default_value = "")]
    pub asset_dir: String,
    #[arg(long, global = true, default_value = "")]
    pub log_dir: String,
    #[arg(long, global = true, default_value_t = false)]
    pub debug: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffConfig {
    pub app_id: String,
    /// Store namespace, `group.<app_id>`.
    pub namespace: String,
    pub group_dir: PathBuf,
    pub scheme: String,
    pub share_key: String,
    pub asset_dir: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub debug: bool,
}

impl HandoffConfig {
    pub fn from_args(args: &ConfigArgs) -> Self {
        Self::resolve(args, |key| std::env::var(key).ok())
    }

    /// Flag, then environment, then default.
    pub fn resolve(args: &ConfigArgs, env: impl Fn(&str) -> Option<String>) -> Self {
        let lookup = |flag: &str, key: &str| -> Option<String> {
            if !flag.trim().is_empty() {
                return Some(flag.to_string());
            }
            env(key).filter(|value| !value.trim().is_empty())
        };

        let app_id = lookup(&args.app_id, "HANDOFF_APP_ID").unwrap_or_else(|| DEFAULT_APP_ID.to_string());
        let namespace = group_identifier(&app_id);
        let group_dir = lookup(&args.group_dir, "HANDOFF_GROUP_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| default_group_dir(&namespace));
        let scheme = lookup(&args.scheme, "HANDOFF_SCHEME").unwrap_or_else(|| DEFAULT_SCHEME.to_string());
        let share_key =
            lookup(&args.key, "HANDOFF_SHARE_KEY").unwrap_or_else(|| DEFAULT_SHARE_KEY.to_string());
        let asset_dir = lookup(&args.asset_dir, "HANDOFF_ASSET_DIR").map(PathBuf::from);
        let log_dir = lookup(&args.log_dir, "HANDOFF_LOG_DIR").map(PathBuf::from);
        let debug = args.debug || env("HANDOFF_DEBUG").is_some_and(|value| truthy(&value));

        Self {
            app_id,
            namespace,
            group_dir,
            scheme,
            share_key,
            asset_dir,
            log_dir,
            debug,
        }
    }

    pub fn store_path(&self) -> PathBuf {
        self.group_dir.join(STORE_FILE_NAME)
    }
}

fn default_group_dir(namespace: &str) -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("handoff")
        .join(namespace)
}

pub fn truthy(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
