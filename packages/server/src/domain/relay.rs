//! Pub/sub relay trait

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use super::error::RelayError;

/// 購読ストリーム
///
/// 個々の要素のエラー（遅延によるスキップなど）は致命的ではありません。
/// ストリームの終端は購読が切れたことを意味します。
pub type RelayStream = BoxStream<'static, Result<Vec<u8>, RelayError>>;

/// インスタンス間の publish/subscribe チャンネル
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Relay: Send + Sync {
    async fn publish(&self, channel: &str, data: Vec<u8>) -> Result<(), RelayError>;

    async fn subscribe(&self, channel: &str) -> Result<RelayStream, RelayError>;
}
