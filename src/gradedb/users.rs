use rusqlite::{Connection, OptionalExtension};

use crate::{gradedb::DBResult, models};

/////*============== USER QUERIES ==============*/
impl<'a> TryFrom<&'a rusqlite::Row<'a>> for models::User {
    type Error = rusqlite::Error;

    fn try_from(row: &rusqlite::Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            username: row.get("Username")?,
            firstname: row.get("Firstname")?,
            lastname: row.get("Lastname")?,
        })
    }
}

/// Returns the user with the username: `username`, if they exist.
pub fn query_user(connection: &Connection, username: &str) -> DBResult<Option<models::User>> {
    let user: Option<models::User> = connection
        .prepare("SELECT Username, Firstname, Lastname FROM User WHERE Username = :username")?
        .query(rusqlite::named_params! { ":username": username })?
        .next()?
        .map(|row| row.try_into())
        .transpose()?;

    Ok(user)
}

/// Returns the UserId for `username`, if such a user exists.
pub fn query_user_id(connection: &Connection, username: &str) -> DBResult<Option<i64>> {
    let user_id = connection
        .prepare("SELECT UserId FROM User WHERE Username = :username")?
        .query_row(rusqlite::named_params! { ":username": username }, |row| row.get("UserId"))
        .optional()?;

    Ok(user_id)
}

/// Adds the user, or overwrites the names and password of the user that
/// already holds `user.username`.
///
/// Returns the user's id either way.
pub fn upsert_user(connection: &Connection, user: &models::User, password: &str) -> DBResult<i64> {
    let username = &user.username;
    log::trace!("[upsert_user] Upserting user {username}...");

    let query_params = rusqlite::named_params! {
            ":username":  username,
            ":firstname": user.firstname,
            ":lastname":  user.lastname,
            ":password":  password,
    };

    if let Some(user_id) = query_user_id(connection, username)? {
        connection
            .prepare(
                "UPDATE User SET
                    Firstname = :firstname,
                    Lastname = :lastname,
                    Password = :password
                 WHERE Username = :username"
            )?
            .execute(query_params)
            .inspect_err(|err| log::error!("[upsert_user] Could not update user '{username}': {err}"))?;

        log::info!("User {username} has been updated.");
        return Ok(user_id);
    }

    connection
        .prepare(
            "INSERT INTO User ( Username,  Firstname,  Lastname,  Password)
             VALUES           (:username, :firstname, :lastname, :password)"
        )?
        .execute(query_params)
        .inspect_err(|err| log::error!("[upsert_user] Could not add user '{username}': {err}"))?;

    log::info!("User {username} has been added to the database.");
    Ok(connection.last_insert_rowid())
}

/// Return whether `password` matches the one stored for `username`.
///
/// NOTE: passwords are stored and compared as plain text. This is not a
/// secure way to keep credentials and is only kept for compatibility with
/// existing databases.
pub fn verify_login(connection: &Connection, username: &str, password: &str) -> DBResult<bool> {
    log::trace!("[verify_login] Checking credentials for {username}...");

    let stored: Option<Option<String>> = connection
        .prepare("SELECT Password FROM User WHERE Username = :username")?
        .query_row(rusqlite::named_params! { ":username": username }, |row| row.get("Password"))
        .optional()?;

    Ok(stored.flatten().is_some_and(|stored| stored == password))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gradedb::schema;

    fn connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        schema::initialize_db(&connection).unwrap();
        connection
    }

    fn ada() -> models::User {
        models::User {
            username: String::from("ada"),
            firstname: String::from("Ada"),
            lastname: String::from("Lovelace"),
        }
    }

    #[test]
    fn upsert_keeps_one_row_and_the_latest_password() {
        let connection = connection();

        let first = upsert_user(&connection, &ada(), "first").unwrap();
        let renamed = models::User { lastname: String::from("King"), ..ada() };
        let second = upsert_user(&connection, &renamed, "second").unwrap();

        assert_eq!(first, second);
        let rows: i64 = connection
            .query_row("SELECT COUNT(*) FROM User", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);

        assert!(verify_login(&connection, "ada", "second").unwrap());
        assert!(!verify_login(&connection, "ada", "first").unwrap());
        assert_eq!(query_user(&connection, "ada").unwrap(), Some(renamed));
    }

    #[test]
    fn new_users_get_distinct_ids() {
        let connection = connection();
        let ada_id = upsert_user(&connection, &ada(), "pw").unwrap();
        let grace = models::User { username: String::from("grace"), ..ada() };
        let grace_id = upsert_user(&connection, &grace, "pw").unwrap();

        assert_ne!(ada_id, grace_id);
        assert_eq!(query_user_id(&connection, "grace").unwrap(), Some(grace_id));
    }

    #[test]
    fn unknown_users_are_absent_not_errors() {
        let connection = connection();
        assert_eq!(query_user(&connection, "nobody").unwrap(), None);
        assert_eq!(query_user_id(&connection, "nobody").unwrap(), None);
        assert!(!verify_login(&connection, "nobody", "").unwrap());
    }
}
