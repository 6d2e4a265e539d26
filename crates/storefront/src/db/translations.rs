//! Translation store.
//!
//! A translation item groups one piece of content across every supported
//! language. Items are written inside the caller's transaction alongside the
//! row that owns them.

use std::collections::BTreeMap;

use futures::TryStreamExt;
use sqlx::{PgConnection, PgPool};
use tracing::instrument;

use vitrina_core::{Language, TranslationItemId, Translations};

use super::RepositoryError;

/// One `(item, language, content)` row.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct TranslationRow {
    pub item_id: TranslationItemId,
    pub lang: Language,
    pub content: String,
}

/// Allocate an item and insert a row for every language.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if an insert fails.
pub async fn create_item(
    conn: &mut PgConnection,
    content: &Translations,
) -> Result<TranslationItemId, RepositoryError> {
    let id: TranslationItemId =
        sqlx::query_scalar("INSERT INTO translation_items DEFAULT VALUES RETURNING id")
            .fetch_one(&mut *conn)
            .await?;

    for (lang, text) in content.iter() {
        sqlx::query("INSERT INTO translations (item_id, lang, content) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(lang)
            .bind(text)
            .execute(&mut *conn)
            .await?;
    }

    Ok(id)
}

/// Update each language's row of an existing item.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if an update fails.
pub async fn update_item(
    conn: &mut PgConnection,
    id: TranslationItemId,
    content: &Translations,
) -> Result<(), RepositoryError> {
    for (lang, text) in content.iter() {
        sqlx::query("UPDATE translations SET content = $3 WHERE item_id = $1 AND lang = $2")
            .bind(id)
            .bind(lang)
            .bind(text)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Delete items; their rows go with them.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the delete fails.
pub async fn delete_items(
    conn: &mut PgConnection,
    ids: &[TranslationItemId],
) -> Result<(), RepositoryError> {
    if ids.is_empty() {
        return Ok(());
    }
    sqlx::query("DELETE FROM translation_items WHERE id = ANY($1)")
        .bind(ids)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Read items and fold their rows into one `Translations` per item.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
#[instrument(skip(pool))]
pub async fn load(
    pool: &PgPool,
    ids: &[TranslationItemId],
) -> Result<BTreeMap<TranslationItemId, Translations>, RepositoryError> {
    let folded = sqlx::query_as::<_, TranslationRow>(
        "SELECT item_id, lang, content FROM translations WHERE item_id = ANY($1)",
    )
    .bind(ids)
    .fetch(pool)
    .try_fold(BTreeMap::new(), |mut folded, row| async move {
        fold_row(&mut folded, row);
        Ok::<_, sqlx::Error>(folded)
    })
    .await?;
    Ok(folded)
}

/// Group rows by item in a single pass.
pub fn fold_translations(
    rows: impl IntoIterator<Item = TranslationRow>,
) -> BTreeMap<TranslationItemId, Translations> {
    rows.into_iter().fold(BTreeMap::new(), |mut folded, row| {
        fold_row(&mut folded, row);
        folded
    })
}

fn fold_row(folded: &mut BTreeMap<TranslationItemId, Translations>, row: TranslationRow) {
    folded
        .entry(row.item_id)
        .or_default()
        .set(row.lang, row.content);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(item: i32, lang: Language, content: &str) -> TranslationRow {
        TranslationRow {
            item_id: TranslationItemId::new(item),
            lang,
            content: content.to_owned(),
        }
    }

    #[test]
    fn test_fold_groups_by_item() {
        let folded = fold_translations([
            row(7, Language::En, "A"),
            row(7, Language::Ua, "Б"),
        ]);
        assert_eq!(folded.len(), 1);
        assert_eq!(
            folded.get(&TranslationItemId::new(7)),
            Some(&Translations {
                en: "A".into(),
                ua: "Б".into(),
            })
        );
    }

    #[test]
    fn test_fold_interleaved_items() {
        let folded = fold_translations([
            row(1, Language::Ua, "один"),
            row(2, Language::En, "two"),
            row(1, Language::En, "one"),
        ]);
        assert_eq!(folded.len(), 2);
        let one = folded.get(&TranslationItemId::new(1)).cloned().unwrap_or_default();
        assert_eq!(one.en, "one");
        assert_eq!(one.ua, "один");
        let two = folded.get(&TranslationItemId::new(2)).cloned().unwrap_or_default();
        assert_eq!(two.en, "two");
        assert_eq!(two.ua, "");
    }

    #[test]
    fn test_fold_empty() {
        assert!(fold_translations(Vec::new()).is_empty());
    }
}
