//! InMemory Membership Store 実装
//!
//! プロジェクト ID → メンバー集合を保持します。メンバーシップは実行中に変更でき、
//! `members_of` は常に呼び出し時点の内容を返します。

use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{ProjectId, RecipientResolver, ResolveError, UserId};

/// インメモリ Membership Store 実装
#[derive(Debug, Clone, Default)]
pub struct InMemoryMembershipStore {
    projects: Arc<RwLock<HashMap<ProjectId, BTreeSet<UserId>>>>,
}

impl InMemoryMembershipStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store seeded from `project -> members` pairs.
    pub fn with_projects<I, M>(projects: I) -> Self
    where
        I: IntoIterator<Item = (ProjectId, M)>,
        M: IntoIterator<Item = UserId>,
    {
        let projects = projects
            .into_iter()
            .map(|(project, members)| (project, members.into_iter().collect()))
            .collect();
        Self {
            projects: Arc::new(RwLock::new(projects)),
        }
    }

    pub async fn set_members(
        &self,
        project_id: ProjectId,
        members: impl IntoIterator<Item = UserId>,
    ) {
        self.projects
            .write()
            .await
            .insert(project_id, members.into_iter().collect());
    }

    pub async fn add_member(&self, project_id: ProjectId, user_id: UserId) {
        self.projects
            .write()
            .await
            .entry(project_id)
            .or_default()
            .insert(user_id);
    }

    pub async fn remove_member(&self, project_id: ProjectId, user_id: UserId) -> bool {
        self.projects
            .write()
            .await
            .get_mut(&project_id)
            .is_some_and(|members| members.remove(&user_id))
    }
}

#[async_trait]
impl RecipientResolver for InMemoryMembershipStore {
    async fn members_of(&self, project_id: ProjectId) -> Result<Vec<UserId>, ResolveError> {
        let projects = self.projects.read().await;
        Ok(projects
            .get(&project_id)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users(ids: &[u64]) -> Vec<UserId> {
        ids.iter().copied().map(UserId::new).collect()
    }

    #[tokio::test]
    async fn test_members_of_seeded_project() {
        // テスト項目: 初期化時に与えたメンバーが返る
        // given (前提条件):
        let store = InMemoryMembershipStore::with_projects([(ProjectId::new(7), users(&[2, 1]))]);

        // when (操作):
        let members = store.members_of(ProjectId::new(7)).await.unwrap();

        // then (期待する結果):
        assert_eq!(members, users(&[1, 2]));
    }

    #[tokio::test]
    async fn test_members_of_unknown_project_is_empty() {
        // テスト項目: 未知のプロジェクトのメンバーは空
        // given (前提条件):
        let store = InMemoryMembershipStore::new();

        // when (操作):
        let members = store.members_of(ProjectId::new(99)).await.unwrap();

        // then (期待する結果):
        assert!(members.is_empty());
    }

    #[tokio::test]
    async fn test_membership_changes_are_visible_immediately() {
        // テスト項目: メンバーの追加・削除が次の members_of に反映される（キャッシュしない）
        // given (前提条件):
        let store = InMemoryMembershipStore::new();
        store.set_members(ProjectId::new(7), users(&[1])).await;

        // when (操作):
        store.add_member(ProjectId::new(7), UserId::new(2)).await;
        let removed = store.remove_member(ProjectId::new(7), UserId::new(1)).await;

        // then (期待する結果):
        assert!(removed);
        assert_eq!(store.members_of(ProjectId::new(7)).await.unwrap(), users(&[2]));
    }
}
