use crate::config::PortalConfig;
use crate::enrich::NutritionSource;
use crate::error::DiningError;
use crate::extractors::{Extractor, MenuExtractor, NutritionExtractor, ParsingContext};
use crate::halls::DiningHallRegistry;
use crate::model::{MenuData, NutritionFacts};
use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client;
use std::time::Duration;

/// The portal rejects obvious bots, so requests look like a desktop browser.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// HTTP client for the FoodPro menu and nutrition pages.
pub struct MenuPortal {
    client: Client,
    registry: DiningHallRegistry,
}

impl MenuPortal {
    pub fn new(registry: DiningHallRegistry, timeout: Option<Duration>) -> Result<Self, DiningError> {
        let timeout = timeout.unwrap_or(Duration::from_secs(30));
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(BROWSER_USER_AGENT)
            .build()?;

        Ok(Self { client, registry })
    }

    /// Build a portal from configuration, honouring a base URL override.
    pub fn from_config(config: &PortalConfig) -> Result<Self, DiningError> {
        let registry = match &config.base_url {
            Some(base_url) => DiningHallRegistry::rutgers().with_base_url(base_url.clone()),
            None => DiningHallRegistry::rutgers(),
        };
        Self::new(registry, Some(Duration::from_secs(config.timeout)))
    }

    pub fn registry(&self) -> &DiningHallRegistry {
        &self.registry
    }

    /// GET a page and return its body. Non-success statuses are errors.
    pub async fn fetch(&self, url: &str) -> Result<String, DiningError> {
        debug!("Fetching {}", url);
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DiningError::UpstreamStatus(status.as_u16()));
        }
        Ok(response.text().await?)
    }

    /// Fetch and extract the menu for one hall, date (M/D/YYYY) and meal period.
    pub async fn fetch_menu(
        &self,
        dining_hall: &str,
        date: &str,
        meal_period: &str,
    ) -> Result<MenuData, DiningError> {
        let url = self.registry.menu_url(dining_hall, date, meal_period)?;
        let html = self.fetch(&url).await?;
        let items = MenuExtractor.parse(&ParsingContext::new(url, html));

        info!(
            "Loaded {} items for {} {} on {}",
            items.len(),
            dining_hall,
            meal_period,
            date
        );
        Ok(MenuData::new(dining_hall, date, meal_period, items))
    }

    /// Fetch and extract one item's nutrition facts page.
    pub async fn fetch_nutrition(&self, nutrition_link: &str) -> Result<NutritionFacts, DiningError> {
        let html = self.fetch(nutrition_link).await?;
        Ok(NutritionExtractor.parse(&ParsingContext::new(nutrition_link, html)))
    }
}

#[async_trait]
impl NutritionSource for MenuPortal {
    async fn nutrition(&self, nutrition_link: &str) -> Result<NutritionFacts, DiningError> {
        self.fetch_nutrition(nutrition_link).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    const MENU_PAGE: &str = r#"<html><body>
        <h3>-- SOUPS --</h3>
        <fieldset>
            <div class="col-1"><label>Chicken Noodle Soup</label></div>
            <div class="col-2"><label>8 OZ</label></div>
            <div class="col-3"><a href="label.aspx?RecNumAndPort=1">Nutrition</a></div>
        </fieldset>
    </body></html>"#;

    fn portal(server: &Server) -> MenuPortal {
        let registry = DiningHallRegistry::rutgers()
            .with_base_url(format!("{}/foodpronet/pickmenu.aspx", server.url()));
        MenuPortal::new(registry, None).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_menu() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/foodpronet/pickmenu.aspx")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("locationNum".into(), "04".into()),
                Matcher::UrlEncoded("dtdate".into(), "3/4/2025".into()),
                Matcher::UrlEncoded("activeMeal".into(), "Lunch".into()),
            ]))
            .match_header("user-agent", Matcher::Regex("Chrome".into()))
            .with_status(200)
            .with_body(MENU_PAGE)
            .create_async()
            .await;

        let menu = portal(&server)
            .fetch_menu("Busch Dining Hall", "3/4/2025", "Lunch")
            .await
            .unwrap();

        assert_eq!(menu.dining_hall, "Busch Dining Hall");
        assert_eq!(menu.items.len(), 1);
        assert_eq!(menu.items[0].category, "SOUPS");
        assert_eq!(menu.items_by_category["SOUPS"][0].portion, "8 OZ");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_menu_upstream_error() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/foodpronet/pickmenu.aspx")
            .match_query(Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let result = portal(&server)
            .fetch_menu("Neilson Dining Hall", "3/4/2025", "Dinner")
            .await;

        match result {
            Err(err @ DiningError::UpstreamStatus(503)) => {
                assert_eq!(err.to_string(), "HTTP error! Status: 503")
            }
            other => panic!("expected upstream status error, got {other:?}"),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_menu_unknown_hall_does_not_hit_network() {
        let server = Server::new_async().await;
        let result = portal(&server).fetch_menu("Nowhere", "3/4/2025", "Lunch").await;
        assert!(matches!(result, Err(DiningError::UnknownDiningHall(_))));
    }

    #[tokio::test]
    async fn test_fetch_nutrition() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/foodpronet/label.aspx")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<h2>Chicken Noodle Soup</h2><b>Calories&nbsp;90</b><b>Protein&nbsp;</b>6g")
            .create_async()
            .await;

        let facts = portal(&server)
            .nutrition(&format!("{}/foodpronet/label.aspx?RecNumAndPort=1", server.url()))
            .await
            .unwrap();

        assert_eq!(facts.item_name, "Chicken Noodle Soup");
        assert_eq!(facts.calories, "90");
        assert_eq!(facts.protein, "6g");
        mock.assert_async().await;
    }
}
