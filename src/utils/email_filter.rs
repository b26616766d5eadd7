use std::sync::RwLock;

use anyhow::{Result, anyhow};
use autoscale_cuckoo_filter::CuckooFilter;
use futures::StreamExt;
use sqlx::MySqlPool;

/// Expected capacity and false-positive rate.
const FILTER_CAPACITY: usize = 100_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;

#[inline]
pub fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Fast negative check for registered emails: `false` means definitely free.
pub struct EmailRegistry {
    filter: RwLock<CuckooFilter<String>>,
}

impl Default for EmailRegistry {
    fn default() -> Self {
        Self {
            filter: RwLock::new(CuckooFilter::new(FILTER_CAPACITY, FALSE_POSITIVE_RATE)),
        }
    }
}

impl EmailRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// False positives possible, false negatives not.
    pub fn might_exist(&self, email: &str) -> bool {
        let email = normalize(email);
        self.filter
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&email)
    }

    pub fn insert(&self, email: &str) {
        let email = normalize(email);
        self.filter
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .add(&email);
    }

    pub fn remove(&self, email: &str) {
        let email = normalize(email);
        self.filter
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&email);
    }

    fn insert_batch(&self, emails: &[String]) {
        let mut filter = self.filter.write().unwrap_or_else(|e| e.into_inner());
        for email in emails {
            filter.add(email);
        }
    }

    /// `true` if the email is free. Only hits the database when the filter is unsure.
    pub async fn is_available(&self, email: &str, pool: &MySqlPool) -> Result<bool, sqlx::Error> {
        if !self.might_exist(email) {
            return Ok(true);
        }

        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = ? LIMIT 1)",
        )
        .bind(normalize(email))
        .fetch_one(pool)
        .await?;

        Ok(!exists)
    }

    /// Loads every stored email, streaming in batches.
    pub async fn warmup(&self, pool: &MySqlPool, batch_size: usize) -> Result<()> {
        let mut stream = sqlx::query_as::<_, (String,)>("SELECT email FROM users").fetch(pool);

        let mut batch = Vec::with_capacity(batch_size);
        let mut total = 0usize;

        while let Some(row) = stream.next().await {
            let (email,) = row.map_err(|e| anyhow!("DB row fetch failed: {}", e))?;

            batch.push(normalize(&email));
            total += 1;

            if batch.len() == batch_size {
                self.insert_batch(&batch);
                batch.clear();
            }
        }

        if !batch.is_empty() {
            self.insert_batch(&batch);
        }

        log::info!("Email filter warmup complete: {} users", total);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_before_lookup() {
        let registry = EmailRegistry::new();
        assert!(!registry.might_exist("guru@sekolah.id"));

        registry.insert("  Guru@Sekolah.id ");
        assert!(registry.might_exist("guru@sekolah.id"));

        registry.remove("GURU@sekolah.id");
        assert!(!registry.might_exist("guru@sekolah.id"));
    }

    #[actix_web::test]
    async fn unknown_email_is_available_without_query() {
        let registry = EmailRegistry::new();
        let pool = MySqlPool::connect_lazy("mysql://root@localhost/siakad").unwrap();

        assert!(registry.is_available("baru@sekolah.id", &pool).await.unwrap());
    }
}
