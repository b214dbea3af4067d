use async_trait::async_trait;

use crate::application::repos::{CreatePostParams, PostsWriteRepo, RepoError, UpdatePostParams};
use crate::domain::entities::PostRecord;

use super::POST_COLUMNS;
use super::types::PostRow;
use crate::infra::db::{PostgresRepositories, map_sqlx_error};

#[async_trait]
impl PostsWriteRepo for PostgresRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let CreatePostParams {
            author_id,
            text,
            group_id,
            image,
        } = params;

        let sql = format!(
            "WITH p AS ( \
                 INSERT INTO posts (text, author_id, group_id, image) \
                 VALUES ($1, $2, $3, $4) \
                 RETURNING id, text, created_at, author_id, group_id, image \
             ) \
             SELECT {POST_COLUMNS} FROM p \
             INNER JOIN users u ON u.id = p.author_id \
             LEFT JOIN groups g ON g.id = p.group_id"
        );

        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(text)
            .bind(author_id)
            .bind(group_id)
            .bind(image)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(PostRecord::from(row))
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let UpdatePostParams {
            id,
            text,
            group_id,
            image,
        } = params;

        let sql = format!(
            "WITH p AS ( \
                 UPDATE posts SET text = $2, group_id = $3, image = $4 \
                 WHERE id = $1 \
                 RETURNING id, text, created_at, author_id, group_id, image \
             ) \
             SELECT {POST_COLUMNS} FROM p \
             INNER JOIN users u ON u.id = p.author_id \
             LEFT JOIN groups g ON g.id = p.group_id"
        );

        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .bind(text)
            .bind(group_id)
            .bind(image)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(PostRecord::from(row))
    }
}
