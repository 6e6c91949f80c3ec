//! Account repository for database operations.
//!
//! Provides database access for shopper accounts, password hashes, and the
//! reusable shipping profile. The `account.email` column carries a unique
//! constraint; every insert maps a unique violation to
//! [`RepositoryError::Conflict`] so callers can treat it as the authoritative
//! duplicate-email signal.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use driftwood_core::{AccountId, Email};

use super::RepositoryError;
use crate::models::account::Account;
use crate::models::address::ShippingAddress;

/// Row shape shared by account queries.
#[derive(sqlx::FromRow)]
struct AccountRow {
    id: i32,
    email: String,
    guest: bool,
    created_at: DateTime<Utc>,
}

impl AccountRow {
    fn into_account(self) -> Result<Account, RepositoryError> {
        let email = Email::parse(&self.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Account {
            id: AccountId::new(self.id),
            email,
            guest: self.guest,
            created_at: self.created_at,
        })
    }
}

/// Repository for account database operations.
pub struct AccountRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AccountRepository<'a> {
    /// Create a new account repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Look up an account by exact email match.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored email is invalid.
    pub async fn find_by_email(&self, email: &Email) -> Result<Option<Account>, RepositoryError> {
        let row = sqlx::query_as::<_, AccountRow>(
            r"
            SELECT id, email, guest, created_at
            FROM storefront.account
            WHERE email = $1
            ",
        )
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(AccountRow::into_account).transpose()
    }

    /// Create a guest account for an email with no existing account.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already has an
    /// account - the caller treats this as an identity conflict, not a bug.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create_guest(&self, email: &Email) -> Result<Account, RepositoryError> {
        let row = sqlx::query_as::<_, AccountRow>(
            r"
            INSERT INTO storefront.account (email, guest)
            VALUES ($1, TRUE)
            RETURNING id, email, guest, created_at
            ",
        )
        .bind(email.as_str())
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_sqlx(e, "email already has an account"))?;

        row.into_account()
    }

    /// Create a registered account with email and password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create_with_password(
        &self,
        email: &Email,
        password_hash: &str,
    ) -> Result<Account, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, AccountRow>(
            r"
            INSERT INTO storefront.account (email, guest)
            VALUES ($1, FALSE)
            RETURNING id, email, guest, created_at
            ",
        )
        .bind(email.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_sqlx(e, "email already has an account"))?;

        let account = row.into_account()?;

        sqlx::query(
            r"
            INSERT INTO storefront.account_password (account_id, password_hash)
            VALUES ($1, $2)
            ",
        )
        .bind(account.id.as_i32())
        .bind(password_hash)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(account)
    }

    /// Get an account's password hash by email.
    ///
    /// Returns `None` if the account doesn't exist or has no password set
    /// (guest accounts have none).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(Account, String)>, RepositoryError> {
        #[derive(sqlx::FromRow)]
        struct Row {
            id: i32,
            email: String,
            guest: bool,
            created_at: DateTime<Utc>,
            password_hash: Option<String>,
        }

        let row = sqlx::query_as::<_, Row>(
            r"
            SELECT a.id, a.email, a.guest, a.created_at, p.password_hash
            FROM storefront.account a
            LEFT JOIN storefront.account_password p ON a.id = p.account_id
            WHERE a.email = $1
            ",
        )
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        let Some(r) = row else {
            return Ok(None);
        };

        let Some(password_hash) = r.password_hash else {
            return Ok(None);
        };

        let account = AccountRow {
            id: r.id,
            email: r.email,
            guest: r.guest,
            created_at: r.created_at,
        }
        .into_account()?;

        Ok(Some((account, password_hash)))
    }

    /// Persist or overwrite the account's shipping/contact profile.
    ///
    /// Idempotent upsert - safe to repeat with the same address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert_profile(
        &self,
        account_id: AccountId,
        address: &ShippingAddress,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO storefront.shipping_profile
                (account_id, full_name, email, phone, address_line1,
                 address_line2, city, state, postal_code, country)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (account_id) DO UPDATE SET
                full_name = EXCLUDED.full_name,
                email = EXCLUDED.email,
                phone = EXCLUDED.phone,
                address_line1 = EXCLUDED.address_line1,
                address_line2 = EXCLUDED.address_line2,
                city = EXCLUDED.city,
                state = EXCLUDED.state,
                postal_code = EXCLUDED.postal_code,
                country = EXCLUDED.country,
                updated_at = NOW()
            ",
        )
        .bind(account_id.as_i32())
        .bind(&address.full_name)
        .bind(address.email.as_str())
        .bind(&address.phone)
        .bind(&address.address_line1)
        .bind(&address.address_line2)
        .bind(&address.city)
        .bind(&address.state)
        .bind(&address.postal_code)
        .bind(&address.country)
        .execute(self.pool)
        .await?;

        Ok(())
    }
}
