//! Recipient resolver trait

use async_trait::async_trait;

use super::{
    error::ResolveError,
    value_object::{ProjectId, UserId},
};

/// プロジェクトのメンバー（＝メッセージの受信資格を持つユーザー）を返す
///
/// 結果はキャッシュしません。呼び出しのたびに最新のメンバーシップを反映します。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecipientResolver: Send + Sync {
    async fn members_of(&self, project_id: ProjectId) -> Result<Vec<UserId>, ResolveError>;
}
