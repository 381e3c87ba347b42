pub mod article;
pub mod state;

pub use article::{merge_tags, Article, RawArticle, NOISE_CLUSTER};
pub use state::{
    ActionKind, ActionLogEntry, ClusterArm, ClusterInfo, FeedItem, SourceState,
    TrendingTechnology,
};
