use dining_assistant::halls::DiningHallRegistry;
use dining_assistant::model::UNCATEGORIZED;
use dining_assistant::summary::{menu_summary, parse_menu_summary, truncate_menu_summary};
use dining_assistant::{DiningError, MenuPortal};
use mockito::{Matcher, Server};

const MENU_PAGE: &str = r#"
<!DOCTYPE html>
<html>
<body>
    <form>
        <fieldset>
            <div class="col-1 menuItem"><label>Orange Juice</label></div>
            <div class="col-2"><label>8 FL OZ</label></div>
        </fieldset>
        <h3>-- BREAKFAST ENTREES --</h3>
        <fieldset>
            <div class="col-1 menuItem"><label>Buttermilk Pancakes</label></div>
            <div class="col-2"><label>3 EACH</label></div>
            <div class="col-3"><a href="label.aspx?locationNum=04&RecNumAndPort=111">Nutrition</a></div>
        </fieldset>
        <fieldset>
            <div class="col-1 menuItem"><label>Scrambled  Eggs</label></div>
            <div class="col-2"><label>4 OZ</label></div>
            <div class="col-3"><a href="LABEL.ASPX?RecNumAndPort=112">Nutrition</a></div>
        </fieldset>
        <fieldset>
            <div class="col-1 menuItem"><label></label></div>
        </fieldset>
        <h3>-- BREAKFAST MEATS --</h3>
        <fieldset>
            <div class="col-1 menuItem"><label>Turkey Sausage</label></div>
            <div class="col-3"><a href="javascript:void(0)">Nutrition</a></div>
        </fieldset>
        <fieldset>
            <div class="col-1 menuItem"><label>Bacon</label></div>
            <div class="col-2"><label>2 SLICES</label></div>
        </fieldset>
    </form>
</body>
</html>
"#;

fn portal(server: &Server) -> MenuPortal {
    let registry = DiningHallRegistry::rutgers()
        .with_base_url(format!("{}/foodpronet/pickmenu.aspx", server.url()));
    MenuPortal::new(registry, None).unwrap()
}

#[tokio::test]
async fn test_menu_page_to_summary() {
    let mut server = Server::new_async().await;
    let _m = server
        .mock("GET", "/foodpronet/pickmenu.aspx")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("locationNum".into(), "03".into()),
            Matcher::UrlEncoded("locationName".into(), "Livingston Dining Commons".into()),
            Matcher::UrlEncoded("activeMeal".into(), "Breakfast".into()),
            Matcher::UrlEncoded("sName".into(), "Rutgers University Dining".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(MENU_PAGE)
        .create_async()
        .await;

    let menu = portal(&server)
        .fetch_menu("Livingston Dining Commons", "10/17/2026", "Breakfast")
        .await
        .unwrap();

    let names: Vec<&str> = menu.items.iter().map(|item| item.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["Orange Juice", "Buttermilk Pancakes", "Scrambled Eggs", "Turkey Sausage", "Bacon"]
    );
    assert_eq!(menu.items[0].category, UNCATEGORIZED);
    assert_eq!(menu.items[1].category, "BREAKFAST ENTREES");
    assert_eq!(
        menu.items[1].nutrition_link.as_deref(),
        Some("https://menuportal23.dining.rutgers.edu/foodpronet/label.aspx?locationNum=04&RecNumAndPort=111")
    );
    assert!(menu.items[2].nutrition_link.is_some());
    assert_eq!(menu.items[3].nutrition_link, None);
    assert_eq!(menu.items[3].portion, "");

    let summary = menu_summary(&menu);
    assert!(summary.starts_with("Menu at Livingston Dining Commons (Breakfast):"));

    let parsed = parse_menu_summary(&summary);
    let categories: Vec<&String> = parsed.keys().collect();
    assert_eq!(categories, vec![UNCATEGORIZED, "BREAKFAST ENTREES", "BREAKFAST MEATS"]);
    assert_eq!(parsed["BREAKFAST MEATS"], vec!["Turkey Sausage", "Bacon"]);

    let truncated = truncate_menu_summary(&summary, 1);
    let truncated = parse_menu_summary(&truncated);
    assert_eq!(truncated.len(), 3);
    assert!(truncated.values().all(|items| items.len() <= 1));
}

#[tokio::test]
async fn test_late_night_period_passes_through() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/foodpronet/pickmenu.aspx")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("locationNum".into(), "13".into()),
            Matcher::UrlEncoded("activeMeal".into(), "Late Night".into()),
            Matcher::UrlEncoded("dtdate".into(), "10/17/2026".into()),
        ]))
        .with_status(200)
        .with_body("<html><body><p>No menu today</p></body></html>")
        .create_async()
        .await;

    let menu = portal(&server)
        .fetch_menu("The Atrium", "10/17/2026", "Late+Night")
        .await
        .unwrap();

    assert!(menu.items.is_empty());
    assert!(menu.items_by_category.is_empty());
    assert_eq!(menu.display_meal_period(), "Late Night");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_nutrition_page_not_found() {
    let mut server = Server::new_async().await;
    let _m = server
        .mock("GET", "/foodpronet/label.aspx")
        .match_query(Matcher::Any)
        .with_status(404)
        .create_async()
        .await;

    let result = portal(&server)
        .fetch_nutrition(&format!("{}/foodpronet/label.aspx?RecNumAndPort=9", server.url()))
        .await;

    assert!(matches!(result, Err(DiningError::UpstreamStatus(404))));
}
