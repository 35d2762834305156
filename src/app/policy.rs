//! Access policy: who may perform which action on which resource.
//!
//! Checks run in two phases. The collection phase runs before any path
//! entity is resolved and only looks at the principal; the object phase runs
//! once the target entity is loaded and compares its owner with the
//! principal.

use crate::domain::user::Principal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Post,
    Comment,
    Group,
    Follow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    List,
    Retrieve,
    Create,
    Update,
    Delete,
}

impl Action {
    /// Read-only actions never modify state.
    pub fn is_safe(self) -> bool {
        matches!(self, Self::List | Self::Retrieve)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Collection,
    Owned { owner_id: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    /// No usable credentials were presented.
    NotAuthenticated,
    /// Credentials are valid but the principal may not do this.
    PermissionDenied,
}

pub fn authorize(
    principal: &Principal,
    action: Action,
    resource: Resource,
    target: Target,
) -> Result<(), Denial> {
    authorize_collection(principal, action, resource)?;

    let owner_id = match target {
        Target::Collection => return Ok(()),
        Target::Owned { owner_id } => owner_id,
    };

    if action.is_safe() && resource != Resource::Follow {
        return Ok(());
    }

    match principal.user_id() {
        Some(user_id) if user_id == owner_id => Ok(()),
        Some(_) => Err(Denial::PermissionDenied),
        None => Err(Denial::NotAuthenticated),
    }
}

fn authorize_collection(
    principal: &Principal,
    action: Action,
    resource: Resource,
) -> Result<(), Denial> {
    match resource {
        Resource::Group if action.is_safe() => Ok(()),
        Resource::Group => Err(Denial::PermissionDenied),
        Resource::Follow if !principal.is_authenticated() => Err(Denial::NotAuthenticated),
        Resource::Follow => Ok(()),
        Resource::Post | Resource::Comment => {
            if action.is_safe() || principal.is_authenticated() {
                Ok(())
            } else {
                Err(Denial::NotAuthenticated)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::user::Actor;

    fn user(id: i64) -> Principal {
        Principal::User(Actor {
            id,
            username: format!("user{}", id),
        })
    }

    #[test]
    fn anonymous_reads_are_allowed() {
        for resource in [Resource::Post, Resource::Comment, Resource::Group] {
            for action in [Action::List, Action::Retrieve] {
                assert_eq!(
                    authorize(&Principal::Anonymous, action, resource, Target::Collection),
                    Ok(())
                );
                assert_eq!(
                    authorize(
                        &Principal::Anonymous,
                        action,
                        resource,
                        Target::Owned { owner_id: 7 }
                    ),
                    Ok(())
                );
            }
        }
    }

    #[test]
    fn anonymous_writes_are_not_authenticated() {
        for resource in [Resource::Post, Resource::Comment, Resource::Follow] {
            for action in [Action::Create, Action::Update, Action::Delete] {
                assert_eq!(
                    authorize(&Principal::Anonymous, action, resource, Target::Collection),
                    Err(Denial::NotAuthenticated)
                );
            }
        }
    }

    #[test]
    fn follow_requires_authentication_even_for_reads() {
        assert_eq!(
            authorize(
                &Principal::Anonymous,
                Action::List,
                Resource::Follow,
                Target::Collection
            ),
            Err(Denial::NotAuthenticated)
        );
        assert_eq!(
            authorize(&user(1), Action::List, Resource::Follow, Target::Collection),
            Ok(())
        );
    }

    #[test]
    fn only_owner_may_modify() {
        for resource in [Resource::Post, Resource::Comment] {
            for action in [Action::Update, Action::Delete] {
                assert_eq!(
                    authorize(&user(1), action, resource, Target::Owned { owner_id: 1 }),
                    Ok(())
                );
                assert_eq!(
                    authorize(&user(2), action, resource, Target::Owned { owner_id: 1 }),
                    Err(Denial::PermissionDenied)
                );
            }
        }
    }

    #[test]
    fn authenticated_users_may_create() {
        for resource in [Resource::Post, Resource::Comment, Resource::Follow] {
            assert_eq!(
                authorize(&user(3), Action::Create, resource, Target::Collection),
                Ok(())
            );
        }
    }

    #[test]
    fn groups_are_read_only() {
        for action in [Action::Create, Action::Update, Action::Delete] {
            assert_eq!(
                authorize(&user(1), action, Resource::Group, Target::Collection),
                Err(Denial::PermissionDenied)
            );
        }
    }

    #[test]
    fn follow_edges_are_private_to_their_owner() {
        assert_eq!(
            authorize(
                &user(2),
                Action::Retrieve,
                Resource::Follow,
                Target::Owned { owner_id: 1 }
            ),
            Err(Denial::PermissionDenied)
        );
        assert_eq!(
            authorize(
                &user(1),
                Action::Retrieve,
                Resource::Follow,
                Target::Owned { owner_id: 1 }
            ),
            Ok(())
        );
    }
}
