use rusqlite::{params, Connection, Row};

use super::{decode_string_list, encode_string_list, with_transaction};
use crate::db::DatabaseError;
use crate::models::User;

/// Insert a user together with its push tokens.
pub fn insert_user(conn: &Connection, user: &User) -> Result<(), DatabaseError> {
    with_transaction(conn, |tx| {
        tx.execute(
            "INSERT INTO users (id, email, display_name, role, subscription_tier, pathologies, is_validated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                user.id,
                user.email,
                user.display_name,
                user.role.as_str(),
                user.subscription_tier.as_str(),
                encode_string_list(&user.pathologies),
                user.is_validated,
            ],
        )?;
        for token in &user.push_tokens {
            add_push_token(tx, &user.id, token)?;
        }
        Ok(())
    })
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<(User, String)> {
    let role: String = row.get(3)?;
    let tier: String = row.get(4)?;
    let pathologies: String = row.get(5)?;
    Ok((
        User {
            id: row.get(0)?,
            email: row.get(1)?,
            display_name: row.get(2)?,
            role: role.parse().unwrap_or(crate::models::UserRole::Patient),
            subscription_tier: tier
                .parse()
                .unwrap_or(crate::models::SubscriptionTier::Free),
            pathologies: Vec::new(),
            push_tokens: Vec::new(),
            is_validated: row.get(6)?,
        },
        pathologies,
    ))
}

fn hydrate(conn: &Connection, (mut user, pathologies): (User, String)) -> Result<User, DatabaseError> {
    user.pathologies = decode_string_list("users.pathologies", &pathologies)?;
    user.push_tokens = list_push_tokens(conn, &user.id)?;
    Ok(user)
}

/// Get a user by id, including push tokens.
pub fn get_user(conn: &Connection, id: &str) -> Result<Option<User>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, email, display_name, role, subscription_tier, pathologies, is_validated
         FROM users WHERE id = ?1",
    )?;
    match stmt.query_row([id], user_from_row) {
        Ok(raw) => hydrate(conn, raw).map(Some),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(DatabaseError::from(e)),
    }
}

/// List every user, ordered by creation.
pub fn list_users(conn: &Connection) -> Result<Vec<User>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, email, display_name, role, subscription_tier, pathologies, is_validated
         FROM users ORDER BY created_at, id",
    )?;
    let raw = stmt
        .query_map([], user_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    raw.into_iter().map(|r| hydrate(conn, r)).collect()
}

/// Mark a user as validated (email confirmed, eligible for the welcome message).
pub fn set_user_validated(conn: &Connection, id: &str, validated: bool) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE users SET is_validated = ?2 WHERE id = ?1",
        params![id, validated],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "User".into(),
            id: id.into(),
        });
    }
    Ok(())
}

/// Push tokens for one user, oldest first.
pub fn list_push_tokens(conn: &Connection, user_id: &str) -> Result<Vec<String>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT token FROM push_tokens WHERE user_id = ?1 ORDER BY created_at, token",
    )?;
    let tokens = stmt
        .query_map([user_id], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tokens)
}

/// Register a push token (idempotent). Returns true when the token is new.
pub fn add_push_token(conn: &Connection, user_id: &str, token: &str) -> Result<bool, DatabaseError> {
    let inserted = conn
        .execute(
            "INSERT OR IGNORE INTO push_tokens (user_id, token) VALUES (?1, ?2)",
            params![user_id, token],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(ref err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                DatabaseError::NotFound {
                    entity_type: "User".into(),
                    id: user_id.into(),
                }
            }
            other => DatabaseError::from(other),
        })?;
    Ok(inserted > 0)
}

/// Remove the given tokens from a user. Returns how many were removed.
pub fn remove_push_tokens(
    conn: &Connection,
    user_id: &str,
    tokens: &[String],
) -> Result<usize, DatabaseError> {
    with_transaction(conn, |tx| {
        let mut removed = 0;
        for token in tokens {
            removed += tx.execute(
                "DELETE FROM push_tokens WHERE user_id = ?1 AND token = ?2",
                params![user_id, token],
            )?;
        }
        Ok(removed)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures;
    use crate::db::sqlite::open_memory_database;
    use crate::models::UserRole;

    #[test]
    fn insert_and_get_user_with_tokens() {
        let conn = open_memory_database().unwrap();
        let mut u = fixtures::user("u-1", &["tok-a", "tok-b"]);
        u.role = UserRole::Admin;
        insert_user(&conn, &u).unwrap();

        let loaded = get_user(&conn, "u-1").unwrap().unwrap();
        assert_eq!(loaded.email, "u-1@example.test");
        assert_eq!(loaded.role, UserRole::Admin);
        assert_eq!(loaded.pathologies, vec!["diabetes".to_string()]);
        assert_eq!(loaded.push_tokens.len(), 2);
        assert!(loaded.is_validated);
    }

    #[test]
    fn get_missing_user_returns_none() {
        let conn = open_memory_database().unwrap();
        assert!(get_user(&conn, "ghost").unwrap().is_none());
    }

    #[test]
    fn list_users_returns_all() {
        let conn = open_memory_database().unwrap();
        fixtures::seed_user(&conn, "u-1", &[]);
        fixtures::seed_user(&conn, "u-2", &["tok"]);
        let users = list_users(&conn).unwrap();
        assert_eq!(users.len(), 2);
        assert!(users.iter().any(|u| u.id == "u-2" && u.push_tokens == vec!["tok"]));
    }

    #[test]
    fn add_push_token_is_idempotent() {
        let conn = open_memory_database().unwrap();
        fixtures::seed_user(&conn, "u-1", &[]);
        assert!(add_push_token(&conn, "u-1", "tok").unwrap());
        assert!(!add_push_token(&conn, "u-1", "tok").unwrap());
        assert_eq!(list_push_tokens(&conn, "u-1").unwrap().len(), 1);
    }

    #[test]
    fn add_push_token_for_unknown_user_is_not_found() {
        let conn = open_memory_database().unwrap();
        let err = add_push_token(&conn, "ghost", "tok").unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[test]
    fn remove_push_tokens_only_touches_listed_tokens() {
        let conn = open_memory_database().unwrap();
        fixtures::seed_user(&conn, "u-1", &["a", "b", "c"]);
        let removed = remove_push_tokens(&conn, "u-1", &["a".into(), "zz".into()]).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(list_push_tokens(&conn, "u-1").unwrap(), vec!["b", "c"]);
    }

    #[test]
    fn set_user_validated_updates_flag() {
        let conn = open_memory_database().unwrap();
        let mut u = fixtures::user("u-1", &[]);
        u.is_validated = false;
        insert_user(&conn, &u).unwrap();
        set_user_validated(&conn, "u-1", true).unwrap();
        assert!(get_user(&conn, "u-1").unwrap().unwrap().is_validated);
        assert!(set_user_validated(&conn, "ghost", true).is_err());
    }
}
