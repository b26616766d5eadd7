use std::time::Duration;

use moka::future::Cache;
use sqlx::MySqlPool;

use crate::model::school::School;

/// School rows by id, read on every check-in. Invalidated when an admin edits the geofence.
#[derive(Clone)]
pub struct GeofenceCache {
    schools: Cache<String, School>,
}

impl GeofenceCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            schools: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn school(&self, pool: &MySqlPool, school_id: &str) -> Result<Option<School>, sqlx::Error> {
        if let Some(school) = self.schools.get(school_id).await {
            return Ok(Some(school));
        }

        let school = sqlx::query_as::<_, School>(
            r#"
            SELECT id, name, address, geofence_latitude, geofence_longitude,
                   geofence_radius_m, geofence_enabled
            FROM schools
            WHERE id = ?
            "#,
        )
        .bind(school_id)
        .fetch_optional(pool)
        .await?;

        if let Some(school) = &school {
            self.schools.insert(school_id.to_string(), school.clone()).await;
        }

        Ok(school)
    }

    pub async fn invalidate(&self, school_id: &str) {
        self.schools.invalidate(school_id).await;
    }
}

#[cfg(test)]
impl GeofenceCache {
    pub async fn prime(&self, school: School) {
        self.schools.insert(school.id.clone(), school).await;
    }

    pub async fn cached(&self, school_id: &str) -> Option<School> {
        self.schools.get(school_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn school(id: &str) -> School {
        School {
            id: id.into(),
            name: "SMA 3".into(),
            address: None,
            geofence_latitude: Some(-6.9),
            geofence_longitude: Some(107.6),
            geofence_radius_m: Some(120.0),
            geofence_enabled: true,
        }
    }

    #[actix_web::test]
    async fn serves_primed_school_without_database() {
        let cache = GeofenceCache::new(Duration::from_secs(60));
        cache.prime(school("s1")).await;

        // lazy pool never connects unless a query runs
        let pool = MySqlPool::connect_lazy("mysql://root@localhost/siakad").unwrap();
        let found = cache.school(&pool, "s1").await.unwrap().unwrap();
        assert_eq!(found.geofence_radius_m, Some(120.0));
    }

    #[actix_web::test]
    async fn invalidation_evicts_entry() {
        let cache = GeofenceCache::new(Duration::from_secs(60));
        cache.prime(school("s1")).await;
        cache.invalidate("s1").await;

        assert!(cache.cached("s1").await.is_none());
    }
}
