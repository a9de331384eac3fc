//! Identity resolution: consolidate partial contact observations into clusters.
//!
//! A cluster is the set of contacts connected through shared email or phone,
//! directly or transitively. Exactly one member is primary; every other member
//! links directly to it. Resolution matches an incoming (email, phone)
//! observation against stored contacts, merges any clusters the observation
//! bridges, records the fragment if it is novel to the cluster, and reports
//! the canonical view.

use serde::Serialize;

use crate::db::{ContactDb, DbContact, LinkPrecedence};
use crate::error::IdentityError;

/// Canonical view of one resolved cluster.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactSummary {
    pub primary_contact_id: i64,
    pub emails: Vec<String>,
    pub phone_numbers: Vec<String>,
    pub secondary_contact_ids: Vec<i64>,
}

/// Trim an optional identifier; whitespace-only input counts as absent.
fn normalize(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Resolve one (email, phone) observation against the stored contacts.
///
/// The full match → merge → record sequence runs in a single IMMEDIATE
/// transaction: a request either applies completely or not at all, and two
/// concurrent resolvers cannot elect different canonical primaries for the
/// same records or double-insert the same novel pair.
pub fn resolve(
    db: &ContactDb,
    email: Option<&str>,
    phone_number: Option<&str>,
) -> Result<ContactSummary, IdentityError> {
    let email = normalize(email);
    let phone_number = normalize(phone_number);
    if email.is_none() && phone_number.is_none() {
        return Err(IdentityError::InvalidRequest);
    }

    db.with_transaction(|tx| resolve_in_tx(tx, email, phone_number))
}

fn resolve_in_tx(
    db: &ContactDb,
    email: Option<&str>,
    phone_number: Option<&str>,
) -> Result<ContactSummary, IdentityError> {
    let matched = db.find_by_email_or_phone(email, phone_number)?;

    // Unseen observation: found a new cluster of one
    if matched.is_empty() {
        let created = db.insert_contact(email, phone_number, None, LinkPrecedence::Primary)?;
        log::info!("Created primary contact {} for a new identity", created.id);
        return build_summary(&[created]);
    }

    // The two match criteria can independently hit two previously unrelated
    // clusters, so the expansion may span more than one primary
    let cluster = db.find_cluster(&matched)?;

    let canonical = elect_canonical(&cluster)?;

    // Merge: every other primary is demoted under the canonical one, and its
    // secondaries are repointed so links stay one hop deep
    for contact in cluster
        .iter()
        .filter(|c| c.is_primary() && c.id != canonical.id)
    {
        db.demote_contact(contact.id, canonical.id)?;
        let repointed = db.reparent_secondaries(contact.id, canonical.id)?;
        log::info!(
            "Merged cluster of contact {} into {} ({} secondaries repointed)",
            contact.id,
            canonical.id,
            repointed
        );
    }

    // Record the fragment only when the exact pair is new to the cluster;
    // resubmitting a known pair creates nothing
    let already_known = cluster
        .iter()
        .any(|c| c.email.as_deref() == email && c.phone_number.as_deref() == phone_number);
    if !already_known {
        let created = db.insert_contact(
            email,
            phone_number,
            Some(canonical.id),
            LinkPrecedence::Secondary,
        )?;
        log::info!(
            "Linked secondary contact {} under {}",
            created.id,
            canonical.id
        );
    }

    let final_cluster = db.find_cluster(std::slice::from_ref(&canonical))?;
    build_summary(&final_cluster)
}

/// The canonical primary of a cluster: earliest `created_at`, ties broken by
/// lowest id.
fn elect_canonical(cluster: &[DbContact]) -> Result<DbContact, IdentityError> {
    cluster
        .iter()
        .filter(|c| c.is_primary())
        .min_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
        .cloned()
        .ok_or_else(|| {
            IdentityError::Consistency(format!(
                "cluster of {} contact(s) has no primary",
                cluster.len()
            ))
        })
}

/// Project a cluster into its canonical summary: primary id, deduplicated
/// emails and phone numbers in cluster order, secondary ids.
pub fn build_summary(cluster: &[DbContact]) -> Result<ContactSummary, IdentityError> {
    let primary = cluster
        .iter()
        .find(|c| c.is_primary())
        .ok_or_else(|| IdentityError::Consistency("cluster has no primary".to_string()))?;

    let mut emails = Vec::new();
    let mut phone_numbers = Vec::new();
    let mut secondary_contact_ids = Vec::new();
    for contact in cluster {
        if let Some(ref email) = contact.email {
            if !email.is_empty() && !emails.contains(email) {
                emails.push(email.clone());
            }
        }
        if let Some(ref phone) = contact.phone_number {
            if !phone.is_empty() && !phone_numbers.contains(phone) {
                phone_numbers.push(phone.clone());
            }
        }
        if !contact.is_primary() {
            secondary_contact_ids.push(contact.id);
        }
    }

    Ok(ContactSummary {
        primary_contact_id: primary.id,
        emails,
        phone_numbers,
        secondary_contact_ids,
    })
}

// =============================================================================
// Tests
// =============================================================================
