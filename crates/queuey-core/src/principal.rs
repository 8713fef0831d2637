//! Principals and ACL assembly. Principal *parsing* from the
//! `Authorization` header lives in `queuey-server`'s auth middleware (it
//! needs the application-key table, an I/O-adjacent lookup); this module
//! owns the pure, backend-independent pieces: the `Principal` type itself,
//! queue-grant parsing, and the ACL assembly function.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::model::QueueAttrs;

/// An authenticated (or anonymous) identity attached to a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Principal {
    /// Granted to every request, authenticated or not.
    Everyone,
    /// `app:<name>`, the application that owns the request's API key.
    Application(String),
    /// `bid:<local>@<domain>`, an additional grantee named in a queue's
    /// `principals` list.
    Bid { local: String, domain: String },
}

static PRINCIPAL_GRANT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:bid:(\w+)@(\w+\.\w+)|app:(\w+))$").unwrap());

impl Principal {
    /// Render as the stored grant string form (`app:foo`, `bid:a@b.com`).
    pub fn as_grant(&self) -> String {
        match self {
            Principal::Everyone => "everyone".to_string(),
            Principal::Application(name) => format!("app:{name}"),
            Principal::Bid { local, domain } => format!("bid:{local}@{domain}"),
        }
    }

    /// Parse one entry of a queue's `principals` CSV: `app:\w+` or
    /// `bid:\w+@\w+\.\w+`.
    pub fn parse_grant(s: &str) -> Option<Self> {
        let caps = PRINCIPAL_GRANT_RE.captures(s.trim())?;
        if let Some(app) = caps.get(3) {
            Some(Principal::Application(app.as_str().to_string()))
        } else {
            Some(Principal::Bid {
                local: caps.get(1)?.as_str().to_string(),
                domain: caps.get(2)?.as_str().to_string(),
            })
        }
    }
}

/// Permissions a queue resource's ACL can grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    Create,
    CreateQueue,
    DeleteQueue,
    View,
    Delete,
}

/// A queue's access control list: the grants in effect for one queue,
/// assembled once per request and cheap to recompute.
#[derive(Debug, Clone, Default)]
pub struct Acl {
    grants: Vec<(Principal, Permission)>,
}

impl Acl {
    /// Pure function of a queue's attributes → its ACL:
    ///
    /// - `app:<application>` always gets `create`, `create_queue`, `delete_queue`.
    /// - If `principals` is non-empty, every listed principal gets `view`
    ///   and `delete`; the owning application is *not* additionally granted
    ///   those two.
    /// - If `principals` is empty, the owning application also gets `view`
    ///   and `delete`.
    /// - If `type == public`, `Everyone` gets `view`.
    pub fn assemble(attrs: &QueueAttrs) -> Self {
        let owner = Principal::Application(attrs.application.clone());
        let mut grants = vec![
            (owner.clone(), Permission::Create),
            (owner.clone(), Permission::CreateQueue),
            (owner.clone(), Permission::DeleteQueue),
        ];

        if attrs.principals.is_empty() {
            grants.push((owner.clone(), Permission::View));
            grants.push((owner, Permission::Delete));
        } else {
            for grant in &attrs.principals {
                if let Some(p) = Principal::parse_grant(grant) {
                    grants.push((p.clone(), Permission::View));
                    grants.push((p, Permission::Delete));
                }
            }
        }

        if attrs.queue_type == crate::model::QueueType::Public {
            grants.push((Principal::Everyone, Permission::View));
        }

        Self { grants }
    }

    pub fn allows(&self, principals: &[Principal], permission: Permission) -> bool {
        let held: HashSet<&Principal> = principals.iter().collect();
        self.grants
            .iter()
            .any(|(p, perm)| *perm == permission && held.contains(p))
    }
}

/// Whether `principals` authenticates as the owner of `application`, the
/// gate for application-level operations (create queue, list queues)
/// that happen before any queue resource (and thus queue ACL) exists.
pub fn owns_application(principals: &[Principal], application: &str) -> bool {
    principals
        .iter()
        .any(|p| matches!(p, Principal::Application(name) if name == application))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConsistencyTier, QueueType};
    use rust_decimal::Decimal;

    fn base_attrs() -> QueueAttrs {
        QueueAttrs {
            queue_name: "q".into(),
            application: "acme".into(),
            partitions: 1,
            queue_type: QueueType::User,
            consistency: ConsistencyTier::Weak,
            principals: vec![],
            created: Decimal::new(0, 0),
        }
    }

    #[test]
    fn empty_principals_grants_owner_view_and_delete() {
        let attrs = base_attrs();
        let acl = Acl::assemble(&attrs);
        let owner = Principal::Application("acme".into());
        assert!(acl.allows(&[owner.clone()], Permission::View));
        assert!(acl.allows(&[owner], Permission::Delete));
    }

    #[test]
    fn non_empty_principals_excludes_owner_from_view() {
        let mut attrs = base_attrs();
        attrs.principals = vec!["bid:fred@example.com".into()];
        let acl = Acl::assemble(&attrs);
        let owner = Principal::Application("acme".into());
        assert!(!acl.allows(&[owner], Permission::View));
        let fred = Principal::Bid {
            local: "fred".into(),
            domain: "example.com".into(),
        };
        assert!(acl.allows(&[fred], Permission::View));
    }

    #[test]
    fn public_queue_grants_everyone_view() {
        let mut attrs = base_attrs();
        attrs.queue_type = QueueType::Public;
        let acl = Acl::assemble(&attrs);
        assert!(acl.allows(&[Principal::Everyone], Permission::View));
        assert!(!acl.allows(&[Principal::Everyone], Permission::Delete));
    }

    #[test]
    fn owner_always_gets_create_queue_grants() {
        let attrs = base_attrs();
        let acl = Acl::assemble(&attrs);
        let owner = Principal::Application("acme".into());
        assert!(acl.allows(&[owner.clone()], Permission::Create));
        assert!(acl.allows(&[owner.clone()], Permission::CreateQueue));
        assert!(acl.allows(&[owner], Permission::DeleteQueue));
    }
}
