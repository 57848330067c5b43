use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, Entity, SupplierId};

use crate::product::optional_text;
use crate::user::normalize_email;

/// Contact information for a supplier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

/// Input for registering or editing a supplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSupplier {
    pub name: String,
    pub contact: ContactInfo,
}

impl NewSupplier {
    /// Trimmed name and contact; blank contact fields become `None` and the
    /// email is lowercased.
    fn normalize(self) -> DomainResult<(String, ContactInfo)> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("supplier name cannot be empty"));
        }
        let email = optional_text(self.contact.email)
            .map(|email| normalize_email(&email))
            .transpose()?;
        Ok((
            name.to_string(),
            ContactInfo {
                phone: optional_text(self.contact.phone),
                email,
                address: optional_text(self.contact.address),
            },
        ))
    }
}

/// A supplier products can be sourced from. Soft-deleted via `is_active`.
///
/// Among active suppliers, names and emails are unique; the store enforces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: SupplierId,
    pub name: String,
    pub contact: ContactInfo,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Supplier {
    pub fn register(id: SupplierId, new: NewSupplier, occurred_at: DateTime<Utc>) -> DomainResult<Self> {
        let (name, contact) = new.normalize()?;
        Ok(Self {
            id,
            name,
            contact,
            is_active: true,
            created_at: occurred_at,
            updated_at: occurred_at,
        })
    }

    /// Replace name and contact details. The active flag is untouched.
    pub fn update(&mut self, edit: NewSupplier, occurred_at: DateTime<Utc>) -> DomainResult<()> {
        if !self.is_active {
            return Err(DomainError::conflict(format!("supplier {} is inactive", self.id)));
        }
        let (name, contact) = edit.normalize()?;
        self.name = name;
        self.contact = contact;
        self.updated_at = occurred_at;
        Ok(())
    }

    /// Soft delete. Whether products still depend on the supplier is checked
    /// by the store, which sees all of them.
    pub fn deactivate(&mut self, occurred_at: DateTime<Utc>) -> DomainResult<()> {
        if !self.is_active {
            return Err(DomainError::conflict(format!("supplier {} is already inactive", self.id)));
        }
        self.is_active = false;
        self.updated_at = occurred_at;
        Ok(())
    }

    /// The name or email this supplier shares with `other`, if any. Only
    /// matters when both are active.
    pub fn clashes_with(&self, other: &Supplier) -> Option<String> {
        if self.id == other.id {
            return None;
        }
        if self.name == other.name {
            return Some(format!("supplier name '{}'", self.name));
        }
        match (&self.contact.email, &other.contact.email) {
            (Some(a), Some(b)) if a == b => Some(format!("supplier email '{a}'")),
            _ => None,
        }
    }
}

impl Entity for Supplier {
    type Id = SupplierId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn is_active(&self) -> bool {
        self.is_active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_supplier(name: &str) -> NewSupplier {
        NewSupplier {
            name: name.to_string(),
            contact: ContactInfo {
                phone: Some("+1-555-0101".to_string()),
                email: Some("contact@techsolutions.com".to_string()),
                address: None,
            },
        }
    }

    #[test]
    fn register_normalizes_name_and_contact() {
        let mut input = new_supplier("  Tech Solutions Inc. ");
        input.contact.email = Some(" Contact@TechSolutions.com ".to_string());
        input.contact.address = Some("   ".to_string());
        let s = Supplier::register(SupplierId::new(), input, Utc::now()).unwrap();
        assert_eq!(s.name, "Tech Solutions Inc.");
        assert_eq!(s.contact.email.as_deref(), Some("contact@techsolutions.com"));
        assert_eq!(s.contact.address, None);
        assert!(s.is_active);
    }

    #[test]
    fn register_rejects_blank_name_and_bad_email() {
        assert!(Supplier::register(SupplierId::new(), new_supplier(" "), Utc::now()).is_err());

        for email in ["sales.officesupplies.com", "@", "sales@"] {
            let mut input = new_supplier("Office Supplies Co.");
            input.contact.email = Some(email.to_string());
            assert!(
                matches!(
                    Supplier::register(SupplierId::new(), input, Utc::now()),
                    Err(DomainError::Validation(_))
                ),
                "{email} should be rejected"
            );
        }
    }

    #[test]
    fn update_replaces_details_and_keeps_flag() {
        let mut s = Supplier::register(SupplierId::new(), new_supplier("Furniture Direct"), Utc::now()).unwrap();
        let created = s.created_at;

        let mut edit = new_supplier(" Furniture Direct Ltd ");
        edit.contact.phone = None;
        s.update(edit, Utc::now()).unwrap();
        assert_eq!(s.name, "Furniture Direct Ltd");
        assert_eq!(s.contact.phone, None);
        assert_eq!(s.created_at, created);
        assert!(s.is_active);

        assert!(s.update(new_supplier(""), Utc::now()).is_err());
        assert_eq!(s.name, "Furniture Direct Ltd");
    }

    #[test]
    fn clashes_on_name_or_email_but_not_with_itself() {
        let a = Supplier::register(SupplierId::new(), new_supplier("Tech Solutions Inc."), Utc::now()).unwrap();
        let mut b = Supplier::register(SupplierId::new(), new_supplier("Electronics Wholesale"), Utc::now()).unwrap();
        assert!(a.clashes_with(&a).is_none());
        assert!(b.clashes_with(&a).is_some(), "same email");

        b.contact.email = None;
        assert!(b.clashes_with(&a).is_none());
        b.name = a.name.clone();
        assert!(b.clashes_with(&a).is_some(), "same name");
    }

    #[test]
    fn deactivate_twice_conflicts() {
        let mut s = Supplier::register(SupplierId::new(), new_supplier("Furniture Direct"), Utc::now()).unwrap();
        s.deactivate(Utc::now()).unwrap();
        assert!(!s.is_active());
        assert!(matches!(s.deactivate(Utc::now()), Err(DomainError::Conflict(_))));
        assert!(matches!(
            s.update(new_supplier("Furniture Direct"), Utc::now()),
            Err(DomainError::Conflict(_))
        ));
    }
}
