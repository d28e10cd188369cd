use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{trace, warn};
use serde::Deserialize;

use crate::io::live_data::CachedPrevious;

use super::{ModeHint, Recommendation, RecommendationSource};

/// Reads the pool snapshot that the poller writes after each successful API call.
pub struct FileRecommendationSource {
    file: PathBuf,
    pool_id: String,
    last_data: CachedPrevious<Recommendation>,
}

impl FileRecommendationSource {
    pub fn new(file: PathBuf, pool_id: String) -> Self {
        Self {
            file,
            pool_id,
            last_data: CachedPrevious::none(),
        }
    }

    async fn read_recommendation(&self) -> Result<Recommendation, String> {
        let s = tokio::fs::read_to_string(&self.file)
            .await
            .map_err(|e| format!("Failed to read {:?}: {}", self.file, e))?;

        let data: PoolsFileData = serde_json::from_str(&s)
            .map_err(|e| format!("Failed to deserialize: {:?}: {}\n{}", self.file, e, s))?;

        let pool = match data {
            PoolsFileData::Single(pool) => pool,
            PoolsFileData::Many(pools) => pools
                .into_iter()
                .find(|pool| pool.id == self.pool_id)
                .ok_or_else(|| format!("No pool with id {} in {:?}", self.pool_id, self.file))?,
        };

        if pool.id != self.pool_id {
            return Err(format!("{:?} is for pool {} not {}", self.file, pool.id, self.pool_id));
        }

        pool.try_into()
    }
}

#[async_trait]
impl RecommendationSource for FileRecommendationSource {
    async fn latest(&self) -> Result<Recommendation, String> {
        match self.read_recommendation().await {
            Ok(recommendation) => {
                trace!("Read recommendation {:?}", recommendation);
                self.last_data.update(recommendation.clone());
                Ok(recommendation)
            }
            Err(e) => {
                let previous = self.last_data.get().ok_or_else(|| {
                    format!("Failed to get recommendation ({:?}) and no last was available: {}", self.file, e)
                })?;
                warn!("Error reading current recommendation: {}, using last valid", e);
                Ok(previous)
            }
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum PoolsFileData {
    Single(PoolData),
    Many(Vec<PoolData>),
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct PoolData {
    id: String,
    #[allow(dead_code)]
    title: String,
    mode: ModeHint,
    latest_measure: Option<LatestMeasure>,
    advice: Option<Advice>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct LatestMeasure {
    is_valid: bool,
    measured_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Advice {
    /// Hours.
    filtration_duration: Option<f64>,
}

impl TryFrom<PoolData> for Recommendation {
    type Error = String;

    fn try_from(pool: PoolData) -> Result<Self, Self::Error> {
        let measure = pool
            .latest_measure
            .ok_or_else(|| format!("Pool {} has no measurement yet", pool.id))?;
        let hours = pool
            .advice
            .and_then(|advice| advice.filtration_duration)
            .ok_or_else(|| format!("Pool {} has no filtration advice", pool.id))?;
        if !hours.is_finite() || hours < 0.0 {
            return Err(format!("Pool {} has a nonsensical filtration duration {}", pool.id, hours));
        }
        let minutes = (hours * 60.0).round().min(24.0 * 60.0) as u32;
        Ok(Recommendation::new(minutes, pool.mode, measure.measured_at, measure.is_valid))
    }
}
