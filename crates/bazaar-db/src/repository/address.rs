//! # Address Repository
//!
//! Shipping addresses. Whenever a user has at least one address, exactly
//! one of them is the default.
//!
//! ## Flag Lifecycle
//! ```text
//! create(first)                  → becomes default whatever was requested
//! create(make_default = true)    → takes the default from the sibling
//! update(make_default = false)   → sole address: stays default
//!                                  otherwise: newest sibling takes over
//! delete(default)                → newest survivor promoted, in the same
//!                                  scope; if that fails the delete fails
//! ```

use bazaar_core::validation::validate_address_fields;
use bazaar_core::{Address, AddressFields, AddressId, UserId};
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use super::candidate::{self, AddressCandidates};
use crate::error::{DbError, DbResult};
use crate::tx::WriteScope;

const ADDRESS_COLUMNS: &str = r#"
    id, user_id, name, street, city, state, postal_code, country, phone,
    is_default, created_at, updated_at
"#;

/// Repository for shipping addresses.
#[derive(Debug, Clone)]
pub struct AddressRepository {
    pool: SqlitePool,
}

impl AddressRepository {
    /// Creates a new AddressRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AddressRepository { pool }
    }

    /// Creates an address for `user_id`.
    ///
    /// The first address a user creates is always the default.
    pub async fn create(
        &self,
        user_id: UserId,
        fields: &AddressFields,
        make_default: bool,
    ) -> DbResult<Address> {
        validate_address_fields(fields)?;

        let mut scope = WriteScope::begin(&self.pool, "address.create").await?;

        let user_exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = ?1)")
            .bind(user_id)
            .fetch_one(scope.conn())
            .await?;
        if !user_exists {
            return Err(DbError::not_found("User", user_id));
        }

        let now = Utc::now();
        let id: AddressId = sqlx::query_scalar(
            r#"
            INSERT INTO addresses (
                user_id, name, street, city, state, postal_code, country, phone,
                is_default, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9, ?9)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(fields.name.trim())
        .bind(fields.street.trim())
        .bind(fields.city.trim())
        .bind(fields.state.trim())
        .bind(fields.postal_code.trim())
        .bind(fields.country.trim())
        .bind(fields.phone.trim())
        .bind(now)
        .fetch_one(scope.conn())
        .await?;

        let is_default =
            candidate::after_insert::<AddressCandidates>(scope.conn(), user_id, id, make_default)
                .await?;

        let address = fetch_owned(scope.conn(), user_id, id).await?;
        scope.commit().await?;

        info!(user_id, address_id = id, is_default, "Address created");
        Ok(address)
    }

    /// Replaces an address's fields and applies the requested default flag.
    pub async fn update(
        &self,
        user_id: UserId,
        address_id: AddressId,
        fields: &AddressFields,
        make_default: bool,
    ) -> DbResult<Address> {
        validate_address_fields(fields)?;

        let mut scope = WriteScope::begin(&self.pool, "address.update").await?;

        let result = sqlx::query(
            r#"
            UPDATE addresses SET
                name = ?3, street = ?4, city = ?5, state = ?6,
                postal_code = ?7, country = ?8, phone = ?9,
                updated_at = ?10
            WHERE id = ?1 AND user_id = ?2
            "#,
        )
        .bind(address_id)
        .bind(user_id)
        .bind(fields.name.trim())
        .bind(fields.street.trim())
        .bind(fields.city.trim())
        .bind(fields.state.trim())
        .bind(fields.postal_code.trim())
        .bind(fields.country.trim())
        .bind(fields.phone.trim())
        .bind(Utc::now())
        .execute(scope.conn())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Address", address_id));
        }

        candidate::after_update::<AddressCandidates>(scope.conn(), user_id, address_id, make_default)
            .await?;

        let address = fetch_owned(scope.conn(), user_id, address_id).await?;
        scope.commit().await?;

        debug!(user_id, address_id, is_default = address.is_default, "Address updated");
        Ok(address)
    }

    /// Deletes an address.
    ///
    /// When the default address is deleted and others remain, the most
    /// recently created survivor becomes the default. Returns that survivor.
    ///
    /// Addresses an order ships to cannot be deleted (Conflict).
    pub async fn delete(&self, user_id: UserId, address_id: AddressId) -> DbResult<Option<AddressId>> {
        let mut scope = WriteScope::begin(&self.pool, "address.delete").await?;

        let was_default = candidate::owned_flag::<AddressCandidates>(scope.conn(), user_id, address_id)
            .await?
            .ok_or_else(|| DbError::not_found("Address", address_id))?;

        sqlx::query("DELETE FROM addresses WHERE id = ?1 AND user_id = ?2")
            .bind(address_id)
            .bind(user_id)
            .execute(scope.conn())
            .await?;

        let promoted =
            candidate::after_delete::<AddressCandidates>(scope.conn(), user_id, was_default).await?;

        scope.commit().await?;

        info!(user_id, address_id, ?promoted, "Address deleted");
        Ok(promoted)
    }

    /// Makes `address_id` the user's default address.
    pub async fn set_default(&self, user_id: UserId, address_id: AddressId) -> DbResult<Address> {
        let mut scope = WriteScope::begin(&self.pool, "address.set_default").await?;

        candidate::set_flag::<AddressCandidates>(scope.conn(), user_id, address_id).await?;
        let address = fetch_owned(scope.conn(), user_id, address_id).await?;

        scope.commit().await?;

        debug!(user_id, address_id, "Default address set");
        Ok(address)
    }

    /// Gets one of the user's addresses.
    pub async fn get(&self, user_id: UserId, address_id: AddressId) -> DbResult<Option<Address>> {
        let sql = format!("SELECT {ADDRESS_COLUMNS} FROM addresses WHERE id = ?1 AND user_id = ?2");

        let address = sqlx::query_as::<_, Address>(&sql)
            .bind(address_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(address)
    }

    /// Lists the user's addresses, default first, then newest first.
    pub async fn list(&self, user_id: UserId) -> DbResult<Vec<Address>> {
        let sql = format!(
            "SELECT {ADDRESS_COLUMNS} FROM addresses WHERE user_id = ?1 \
             ORDER BY is_default DESC, id DESC"
        );

        let addresses = sqlx::query_as::<_, Address>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(addresses)
    }

    /// The user's default address, if they have any address at all.
    pub async fn default_for(&self, user_id: UserId) -> DbResult<Option<Address>> {
        let sql = format!(
            "SELECT {ADDRESS_COLUMNS} FROM addresses WHERE user_id = ?1 AND is_default = 1"
        );

        let address = sqlx::query_as::<_, Address>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(address)
    }
}

async fn fetch_owned(conn: &mut SqliteConnection, user_id: UserId, address_id: AddressId) -> DbResult<Address> {
    let sql = format!("SELECT {ADDRESS_COLUMNS} FROM addresses WHERE id = ?1 AND user_id = ?2");

    sqlx::query_as::<_, Address>(&sql)
        .bind(address_id)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Address", address_id))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig, ErrorKind};

    async fn setup() -> (Database, UserId) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let user = db.catalog().create_user("Ana", "ana@example.com").await.unwrap();
        (db, user.id)
    }

    fn fields(name: &str) -> AddressFields {
        AddressFields {
            name: name.to_string(),
            street: "1 Rua Augusta".to_string(),
            city: "Lisbon".to_string(),
            state: "Lisboa".to_string(),
            postal_code: "1100-053".to_string(),
            country: "PT".to_string(),
            phone: "+351 210 000 000".to_string(),
        }
    }

    async fn default_ids(db: &Database, user_id: UserId) -> Vec<AddressId> {
        db.addresses()
            .list(user_id)
            .await
            .unwrap()
            .into_iter()
            .filter(|a| a.is_default)
            .map(|a| a.id)
            .collect()
    }

    #[tokio::test]
    async fn test_first_address_becomes_default() {
        let (db, user) = setup().await;

        let a = db.addresses().create(user, &fields("Home"), false).await.unwrap();
        assert!(a.is_default);

        let b = db.addresses().create(user, &fields("Work"), false).await.unwrap();
        assert!(!b.is_default);
        assert_eq!(default_ids(&db, user).await, vec![a.id]);
    }

    #[tokio::test]
    async fn test_new_default_replaces_old_one() {
        let (db, user) = setup().await;

        let a = db.addresses().create(user, &fields("Home"), false).await.unwrap();
        let b = db.addresses().create(user, &fields("Work"), true).await.unwrap();

        assert!(b.is_default);
        assert_eq!(default_ids(&db, user).await, vec![b.id]);
        assert!(!db.addresses().get(user, a.id).await.unwrap().unwrap().is_default);
    }

    #[tokio::test]
    async fn test_deleting_default_promotes_newest() {
        let (db, user) = setup().await;

        let a = db.addresses().create(user, &fields("Home"), false).await.unwrap();
        let b = db.addresses().create(user, &fields("Work"), false).await.unwrap();
        let c = db.addresses().create(user, &fields("Gym"), false).await.unwrap();
        assert!(a.is_default);

        let promoted = db.addresses().delete(user, a.id).await.unwrap();
        assert_eq!(promoted, Some(c.id));
        assert_eq!(default_ids(&db, user).await, vec![c.id]);

        // Deleting a non-default address promotes nobody
        assert_eq!(db.addresses().delete(user, b.id).await.unwrap(), None);
        assert_eq!(default_ids(&db, user).await, vec![c.id]);

        // Deleting the last one leaves no default
        assert_eq!(db.addresses().delete(user, c.id).await.unwrap(), None);
        assert!(db.addresses().default_for(user).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sole_address_cannot_be_undefaulted() {
        let (db, user) = setup().await;

        let a = db.addresses().create(user, &fields("Home"), false).await.unwrap();
        let updated = db
            .addresses()
            .update(user, a.id, &fields("Home (new)"), false)
            .await
            .unwrap();

        assert!(updated.is_default);
        assert_eq!(updated.name, "Home (new)");
    }

    #[tokio::test]
    async fn test_undefaulting_hands_flag_to_newest_sibling() {
        let (db, user) = setup().await;

        let a = db.addresses().create(user, &fields("Home"), false).await.unwrap();
        let b = db.addresses().create(user, &fields("Work"), false).await.unwrap();

        let updated = db.addresses().update(user, a.id, &fields("Home"), false).await.unwrap();
        assert!(!updated.is_default);
        assert_eq!(default_ids(&db, user).await, vec![b.id]);

        let updated = db.addresses().update(user, a.id, &fields("Home"), true).await.unwrap();
        assert!(updated.is_default);
        assert_eq!(default_ids(&db, user).await, vec![a.id]);
    }

    #[tokio::test]
    async fn test_set_default() {
        let (db, user) = setup().await;

        db.addresses().create(user, &fields("Home"), false).await.unwrap();
        let b = db.addresses().create(user, &fields("Work"), false).await.unwrap();

        let b = db.addresses().set_default(user, b.id).await.unwrap();
        assert!(b.is_default);
        assert_eq!(db.addresses().default_for(user).await.unwrap().unwrap().id, b.id);
        assert_eq!(db.addresses().list(user).await.unwrap()[0].id, b.id);
    }

    #[tokio::test]
    async fn test_addresses_are_scoped_to_their_owner() {
        let (db, ana) = setup().await;
        let bo = db.catalog().create_user("Bo", "bo@example.com").await.unwrap().id;

        let a = db.addresses().create(ana, &fields("Home"), false).await.unwrap();

        let err = db.addresses().set_default(bo, a.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let err = db.addresses().delete(bo, a.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let err = db.addresses().update(bo, a.id, &fields("X"), true).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(db.addresses().get(bo, a.id).await.unwrap().is_none());

        // Ana's default is untouched
        assert_eq!(default_ids(&db, ana).await, vec![a.id]);
    }

    #[tokio::test]
    async fn test_create_validates_and_checks_user() {
        let (db, user) = setup().await;

        let mut missing_city = fields("Home");
        missing_city.city = "  ".to_string();
        let err = db.addresses().create(user, &missing_city, false).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = db.addresses().create(9_999, &fields("Home"), false).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(db.addresses().list(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_promotion_rolls_back_delete() {
        let (db, user) = setup().await;

        let a = db.addresses().create(user, &fields("Broken"), false).await.unwrap();
        let b = db.addresses().create(user, &fields("Work"), true).await.unwrap();

        sqlx::query(
            r#"
            CREATE TRIGGER refuse_broken_default
            BEFORE UPDATE OF is_default ON addresses
            WHEN NEW.is_default = 1 AND NEW.name = 'Broken'
            BEGIN
                SELECT RAISE(ABORT, 'default refused');
            END
            "#,
        )
        .execute(db.pool())
        .await
        .unwrap();

        let err = db.addresses().delete(user, b.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransactionFailure);

        // The delete was undone along with the failed promotion
        assert!(db.addresses().get(user, b.id).await.unwrap().is_some());
        assert_eq!(default_ids(&db, user).await, vec![b.id]);
        assert!(db.addresses().get(user, a.id).await.unwrap().is_some());
    }
}
