//! Registration and maintenance of products, suppliers, and users.
//!
//! None of these operations change a product's quantity, except the opening
//! balance recorded together with a newly registered product.

use tracing::instrument;

use stockledger_core::{Entity, ProductId, SupplierId, UserId};
use stockledger_inventory::{
    DeactivateProduct, NewProduct, NewSupplier, NewUser, Product, ProductCommand, ProductDetails,
    StockTransaction, Supplier, UpdateDetails, User,
};

use super::{LedgerError, StockLedger, now};
use crate::store::LedgerStore;

impl<S> StockLedger<S>
where
    S: LedgerStore,
{
    #[instrument(skip_all, fields(username = %new.username), err)]
    pub async fn register_user(&self, new: NewUser) -> Result<User, LedgerError> {
        let user = User::register(UserId::new(), new, now())?;
        self.store.insert_user(&user).await?;
        tracing::info!(user_id = %user.id, role = user.role.as_str(), "user registered");
        Ok(user)
    }

    pub async fn user(&self, id: UserId) -> Result<User, LedgerError> {
        self.store
            .load_user(id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("user {id}")))
    }

    /// Fails with `Conflict` when an active supplier already has the name or email.
    #[instrument(skip_all, fields(name = %new.name), err)]
    pub async fn register_supplier(&self, new: NewSupplier) -> Result<Supplier, LedgerError> {
        let supplier = Supplier::register(SupplierId::new(), new, now())?;
        self.store.insert_supplier(&supplier).await?;
        tracing::info!(supplier_id = %supplier.id, "supplier registered");
        Ok(supplier)
    }

    /// Replace a supplier's name and contact details.
    ///
    /// Fails with `Conflict` when another active supplier already uses the new
    /// name or email.
    #[instrument(skip(self, edit), fields(name = %edit.name), err)]
    pub async fn update_supplier(
        &self,
        id: SupplierId,
        edit: NewSupplier,
    ) -> Result<Supplier, LedgerError> {
        let mut supplier = self.supplier(id).await?;
        supplier.update(edit, now())?;
        self.store.update_supplier(&supplier).await?;
        tracing::info!(supplier_id = %id, "supplier updated");
        Ok(supplier)
    }

    /// Soft-delete a supplier.
    ///
    /// Refused with `Conflict` while any active product references it; those
    /// products have to be reassigned or deactivated first.
    #[instrument(skip(self), err)]
    pub async fn deactivate_supplier(&self, id: SupplierId) -> Result<Supplier, LedgerError> {
        let mut supplier = self.supplier(id).await?;
        supplier.deactivate(now())?;
        self.store.update_supplier(&supplier).await?;
        tracing::info!(supplier_id = %id, "supplier deactivated");
        Ok(supplier)
    }

    pub async fn supplier(&self, id: SupplierId) -> Result<Supplier, LedgerError> {
        self.store
            .load_supplier(id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("supplier {id}")))
    }

    /// All suppliers, active or not, ordered by name.
    pub async fn suppliers(&self) -> Result<Vec<Supplier>, LedgerError> {
        Ok(self.store.list_suppliers().await?)
    }

    /// Register a product. A positive initial quantity is stored as an opening
    /// `add` entry attributed to `actor`, in the same write as the product.
    #[instrument(skip_all, fields(name = %new.name, initial_quantity = new.initial_quantity, actor = %actor), err)]
    pub async fn register_product(
        &self,
        new: NewProduct,
        actor: UserId,
    ) -> Result<(Product, Option<StockTransaction>), LedgerError> {
        self.active_user(actor).await?;
        if let Some(supplier_id) = new.supplier_id {
            self.active_supplier(supplier_id).await?;
        }

        let (product, opening) = Product::register(ProductId::new(), new, actor, now())?;
        self.store.insert_product(&product, opening.as_ref()).await?;

        tracing::info!(
            product_id = %product.id_typed(),
            quantity = product.quantity(),
            "product registered"
        );
        Ok((product, opening))
    }

    /// Update editable attributes. Quantity and SKU never change here.
    ///
    /// Switching to a different supplier requires that supplier to be active.
    #[instrument(skip(self, details), err)]
    pub async fn update_product(
        &self,
        id: ProductId,
        details: ProductDetails,
    ) -> Result<Product, LedgerError> {
        if let Some(supplier_id) = details.supplier_id {
            let current = self.product(id).await?;
            if current.supplier_id() != Some(supplier_id) {
                self.active_supplier(supplier_id).await?;
            }
        }

        let (product, _) = self
            .execute(id, |_| {
                ProductCommand::UpdateDetails(UpdateDetails {
                    product_id: id,
                    details: details.clone(),
                    occurred_at: now(),
                })
            })
            .await?;
        Ok(product)
    }

    /// Soft-delete a product. Its history stays readable.
    #[instrument(skip(self), err)]
    pub async fn deactivate_product(&self, id: ProductId) -> Result<Product, LedgerError> {
        let (product, _) = self
            .execute(id, |_| {
                ProductCommand::Deactivate(DeactivateProduct {
                    product_id: id,
                    occurred_at: now(),
                })
            })
            .await?;
        tracing::info!(product_id = %id, "product deactivated");
        Ok(product)
    }

    pub async fn product(&self, id: ProductId) -> Result<Product, LedgerError> {
        self.store
            .load_product(id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("product {id}")))
    }

    /// All products, active or not, ordered by name.
    pub async fn products(&self) -> Result<Vec<Product>, LedgerError> {
        Ok(self.store.list_products().await?)
    }

    async fn active_supplier(&self, id: SupplierId) -> Result<Supplier, LedgerError> {
        let supplier = self.supplier(id).await?;
        if !supplier.is_active() {
            return Err(LedgerError::Validation(format!("supplier {id} is inactive")));
        }
        Ok(supplier)
    }
}
