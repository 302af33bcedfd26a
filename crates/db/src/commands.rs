//! Admin command documents and reply parsing.

use mongodb::bson::{doc, Bson, Document};

use flashscore_kernel::error::{BootstrapError, Result};
use flashscore_kernel::model::{AuthenticatedUser, Principal, RoleGrant, Secret};

pub(crate) fn ping() -> Document {
    doc! { "ping": 1 }
}

pub(crate) fn connection_status() -> Document {
    doc! { "connectionStatus": 1 }
}

pub(crate) fn create_user(principal: &Principal, password: &Secret) -> Document {
    let roles: Vec<Document> = principal
        .roles
        .iter()
        .map(|grant| doc! { "role": grant.role.as_str(), "db": grant.db.as_str() })
        .collect();

    doc! {
        "createUser": principal.name.as_str(),
        "pwd": password.expose(),
        "roles": roles,
    }
}

pub(crate) fn users_info(database: &str, name: &str) -> Document {
    doc! { "usersInfo": { "user": name, "db": database } }
}

/// Extract the principal from a `usersInfo` reply, if the engine returned one.
pub(crate) fn parse_users_info(
    reply: &Document,
    database: &str,
    name: &str,
) -> Result<Option<Principal>> {
    let users = reply
        .get_array("users")
        .map_err(|err| malformed("usersInfo", err))?;

    for user in users {
        let Bson::Document(user) = user else {
            continue;
        };
        let user_name = user.get_str("user").map_err(|err| malformed("usersInfo", err))?;
        let user_db = user.get_str("db").map_err(|err| malformed("usersInfo", err))?;
        if user_name != name || user_db != database {
            continue;
        }

        let mut principal = Principal::new(user_name, user_db, std::iter::empty::<&str>());
        for role in user.get_array("roles").map_err(|err| malformed("usersInfo", err))? {
            if let Bson::Document(role) = role {
                let grant = RoleGrant::new(
                    role.get_str("role").map_err(|err| malformed("usersInfo", err))?,
                    role.get_str("db").map_err(|err| malformed("usersInfo", err))?,
                );
                principal.roles.insert(grant);
            }
        }
        return Ok(Some(principal));
    }

    Ok(None)
}

/// Extract `authInfo.authenticatedUsers` from a `connectionStatus` reply.
pub(crate) fn parse_connection_status(reply: &Document) -> Result<Vec<AuthenticatedUser>> {
    let users = reply
        .get_document("authInfo")
        .and_then(|auth| auth.get_array("authenticatedUsers"))
        .map_err(|err| malformed("connectionStatus", err))?;

    users
        .iter()
        .filter_map(|user| match user {
            Bson::Document(user) => Some(user),
            _ => None,
        })
        .map(|user| {
            Ok(AuthenticatedUser {
                user: user
                    .get_str("user")
                    .map_err(|err| malformed("connectionStatus", err))?
                    .to_string(),
                db: user
                    .get_str("db")
                    .map_err(|err| malformed("connectionStatus", err))?
                    .to_string(),
            })
        })
        .collect()
}

fn malformed(command: &str, err: impl std::fmt::Display) -> BootstrapError {
    BootstrapError::database(format!("malformed {command} reply: {err}"))
}
