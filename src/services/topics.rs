//! Discussion platform topic publishing.
//!
//! Each route and stop maps to one named topic. Deletion never removes a
//! topic: the title is relabeled with a prefix instead, so existing
//! comments live on and visitors can see the entity is gone. Resurrection
//! restores the plain title.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::{PlatformConfig, Route, Stop};
use crate::utils::{defuse_hashtags, table_key};

/// Consumer of state-tagged diff records; the seam the publish stage
/// drives so it can be exercised without a live platform.
#[async_trait]
pub trait TopicPublisher: Send + Sync {
    async fn create_route(&self, route: &Route) -> Result<()>;
    async fn update_route(&self, route: &Route) -> Result<()>;
    async fn delete_route(&self, route: &Route) -> Result<()>;
    async fn resurrect_route(&self, route: &Route) -> Result<()>;

    async fn create_stop(&self, stop: &Stop) -> Result<()>;
    async fn update_stop(&self, stop: &Stop) -> Result<()>;
    async fn delete_stop(&self, stop: &Stop) -> Result<()>;
    async fn resurrect_stop(&self, stop: &Stop) -> Result<()>;
}

/// Topic name for a route; unique per logical route and safe as a table
/// key, so the platform can store it as a named topic.
pub fn route_topic_name(route: &Route) -> String {
    table_key(&format!("route_{}_{}", route.region_id, route.id))
}

/// Topic title for a route: `ShortName - LongName`, with either half
/// dropped when it is blank.
pub fn route_topic_title(route: &Route) -> String {
    let short_name = route.short_name.trim();
    let long_name = route.long_name.trim();
    let title = match (short_name.is_empty(), long_name.is_empty()) {
        (false, false) => format!("{short_name} - {long_name}"),
        (false, true) => short_name.to_string(),
        (true, _) => long_name.to_string(),
    };
    defuse_hashtags(&title)
}

/// Topic text for a route.
pub fn route_topic_text(route: &Route) -> String {
    let name = if !route.long_name.trim().is_empty() {
        route.long_name.trim()
    } else {
        route.short_name.trim()
    };
    if name.is_empty() {
        return String::new();
    }
    defuse_hashtags(&format!("Discuss the {name} route"))
}

/// Topic name for a stop.
pub fn stop_topic_name(stop: &Stop) -> String {
    table_key(&format!("stop_{}_{}", stop.region_id, stop.id))
}

/// Topic title for a stop: `Name (Direction)`.
pub fn stop_topic_title(stop: &Stop) -> String {
    let name = stop.name.trim();
    let direction = stop.direction.trim();
    let title = if name.is_empty() || direction.is_empty() {
        name.to_string()
    } else {
        format!("{name} ({direction})")
    };
    defuse_hashtags(&title)
}

/// Topic text for a stop.
pub fn stop_topic_text(stop: &Stop) -> String {
    let name = stop.name.trim();
    if name.is_empty() {
        return String::new();
    }
    let direction = stop.direction.trim();
    let text = if direction.is_empty() {
        format!("Discuss the stop at {name}")
    } else {
        format!("Discuss the stop at {name} ({direction})")
    };
    defuse_hashtags(&text)
}

#[derive(Serialize)]
struct TopicRequest<'a> {
    name: &'a str,
    title: &'a str,
    text: &'a str,
    /// Region id, used by the platform to group topics
    category: &'a str,
    language: &'a str,
    publisher: &'a str,
}

/// HTTP client for the platform's topic API.
pub struct TopicClient {
    config: PlatformConfig,
    client: reqwest::Client,
}

impl TopicClient {
    pub fn new(config: &PlatformConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            config: config.clone(),
            client,
        })
    }

    async fn create_topic(
        &self,
        name: &str,
        title: &str,
        text: &str,
        category: &str,
    ) -> Result<()> {
        let url = format!("{}/topics", self.config.base_uri.trim_end_matches('/'));
        let request = TopicRequest {
            name,
            title,
            text,
            category,
            language: &self.config.topic_language,
            publisher: &self.config.user_handle,
        };
        self.client
            .post(url)
            .bearer_auth(&self.config.app_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::publish(name, e))?
            .error_for_status()
            .map_err(|e| AppError::publish(name, e))?;
        Ok(())
    }

    async fn update_topic(
        &self,
        name: &str,
        title: &str,
        text: &str,
        category: &str,
    ) -> Result<()> {
        let url = format!(
            "{}/topics/{}",
            self.config.base_uri.trim_end_matches('/'),
            name
        );
        let request = TopicRequest {
            name,
            title,
            text,
            category,
            language: &self.config.topic_language,
            publisher: &self.config.user_handle,
        };
        self.client
            .put(url)
            .bearer_auth(&self.config.app_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::publish(name, e))?
            .error_for_status()
            .map_err(|e| AppError::publish(name, e))?;
        Ok(())
    }

    fn deleted_title(&self, title: &str) -> String {
        format!("{}{}", self.config.deleted_title_prefix, title)
    }
}

#[async_trait]
impl TopicPublisher for TopicClient {
    async fn create_route(&self, route: &Route) -> Result<()> {
        self.create_topic(
            &route_topic_name(route),
            &route_topic_title(route),
            &route_topic_text(route),
            &route.region_id,
        )
        .await
    }

    async fn update_route(&self, route: &Route) -> Result<()> {
        self.update_topic(
            &route_topic_name(route),
            &route_topic_title(route),
            &route_topic_text(route),
            &route.region_id,
        )
        .await
    }

    async fn delete_route(&self, route: &Route) -> Result<()> {
        self.update_topic(
            &route_topic_name(route),
            &self.deleted_title(&route_topic_title(route)),
            &route_topic_text(route),
            &route.region_id,
        )
        .await
    }

    async fn resurrect_route(&self, route: &Route) -> Result<()> {
        // restoring the plain title is all a resurrection needs
        self.update_route(route).await
    }

    async fn create_stop(&self, stop: &Stop) -> Result<()> {
        self.create_topic(
            &stop_topic_name(stop),
            &stop_topic_title(stop),
            &stop_topic_text(stop),
            &stop.region_id,
        )
        .await
    }

    async fn update_stop(&self, stop: &Stop) -> Result<()> {
        self.update_topic(
            &stop_topic_name(stop),
            &stop_topic_title(stop),
            &stop_topic_text(stop),
            &stop.region_id,
        )
        .await
    }

    async fn delete_stop(&self, stop: &Stop) -> Result<()> {
        self.update_topic(
            &stop_topic_name(stop),
            &self.deleted_title(&stop_topic_title(stop)),
            &stop_topic_text(stop),
            &stop.region_id,
        )
        .await
    }

    async fn resurrect_stop(&self, stop: &Stop) -> Result<()> {
        self.update_stop(stop).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RowState;

    fn route(short_name: &str, long_name: &str) -> Route {
        Route {
            id: "40_100479".to_string(),
            short_name: short_name.to_string(),
            long_name: long_name.to_string(),
            description: String::new(),
            url: String::new(),
            agency_id: "40".to_string(),
            region_id: "1".to_string(),
            state: RowState::Default,
            raw: String::new(),
        }
    }

    fn stop(name: &str, direction: &str) -> Stop {
        Stop {
            id: "1_75403".to_string(),
            name: name.to_string(),
            direction: direction.to_string(),
            code: String::new(),
            lat: 0.0,
            lon: 0.0,
            region_id: "1".to_string(),
            state: RowState::Default,
            raw: String::new(),
        }
    }

    #[test]
    fn test_route_topic_name_is_table_safe() {
        let mut r = route("44", "Ballard");
        r.id = "40/100479".to_string();
        assert_eq!(route_topic_name(&r), "route_1_402f100479");
    }

    #[test]
    fn test_route_topic_title_variants() {
        assert_eq!(route_topic_title(&route("44", "Ballard - Montlake")), "44 - Ballard - Montlake");
        assert_eq!(route_topic_title(&route("44", "")), "44");
        assert_eq!(route_topic_title(&route("", "Ballard")), "Ballard");
        assert_eq!(route_topic_title(&route("", "")), "");
    }

    #[test]
    fn test_route_topic_text_prefers_long_name() {
        assert_eq!(
            route_topic_text(&route("44", "Ballard - Montlake")),
            "Discuss the Ballard - Montlake route"
        );
        assert_eq!(route_topic_text(&route("44", "")), "Discuss the 44 route");
        assert_eq!(route_topic_text(&route("", "")), "");
    }

    #[test]
    fn test_stop_topic_title_and_text() {
        assert_eq!(stop_topic_title(&stop("NE 45th St", "E")), "NE 45th St (E)");
        assert_eq!(stop_topic_title(&stop("NE 45th St", "")), "NE 45th St");
        assert_eq!(
            stop_topic_text(&stop("NE 45th St", "E")),
            "Discuss the stop at NE 45th St (E)"
        );
        assert_eq!(stop_topic_text(&stop("", "E")), "");
    }

    #[test]
    fn test_titles_defuse_hashtags() {
        assert_eq!(stop_topic_title(&stop("#1234 Main St", "N")), "# 1234 Main St (N)");
        assert_eq!(route_topic_title(&route("#7", "")), "# 7");
    }
}
