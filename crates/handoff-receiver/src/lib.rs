pub mod channel;
pub mod commands;
pub mod lifecycle;
pub mod resolver;
pub mod router;
pub mod subscription;

pub use channel::{ChannelState, InitialSlot};
pub use commands::CommandError;
pub use lifecycle::{LaunchOptions, UserActivity};
pub use resolver::{
    AssetCatalog, CatalogAsset, DirectPaths, FullSizeCallback, FullSizeRequest,
    IdentifierResolver, PlatformResolver, ResolveError,
};
pub use router::ShareReceiver;
pub use subscription::{ShareSink, ShareUpdate, SubscriptionManager};
