pub mod file;

pub use castbot_common::traits::repository_traits::ChannelStore;
pub use file::FileChannelStore;
