use chrono::NaiveDate;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use wardrobe::prelude::*;

const OWNER: &str = "8d0fd2b3-9ca6-4a3b-9d8a-5a1b2c3d4e5f";

fn item_row(id: Uuid, category: &str, layer: Option<&str>, name: &str, status: &str) -> Value {
    json!({
        "id": id,
        "owner_id": OWNER,
        "category": category,
        "layer": layer,
        "name": name,
        "status": status,
        "care_tags": ["cold wash"],
    })
}

/// Build an outfit from the catalog, schedule it, read the week back and
/// export the catalog, all against one mocked backend
#[tokio::test]
async fn build_schedule_and_export() {
    let server = MockServer::start().await;
    let ctx = AuthContext::new(Uuid::parse_str(OWNER).unwrap(), "user-token");
    let wardrobe = Wardrobe::new(WardrobeConfig::new(&server.uri(), "anon-key").unwrap()).unwrap();

    let tee = Uuid::new_v4();
    let jeans = Uuid::new_v4();
    let cap = Uuid::new_v4();
    let watch = Uuid::new_v4();
    let catalog = json!([
        item_row(tee, "top", Some("base"), "Tee", "laundry"),
        item_row(jeans, "bottom", Some("outer"), "Jeans", "clean"),
        item_row(cap, "accessory", None, "Cap", "clean"),
        item_row(watch, "accessory", None, "Watch", "clean"),
    ]);
    Mock::given(method("GET"))
        .and(path("/rest/v1/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(catalog))
        .mount(&server)
        .await;

    let outfit_id = Uuid::new_v4();
    let rpc_items: Arc<Mutex<Option<Value>>> = Arc::default();
    let seen = rpc_items.clone();
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/create_outfit_with_items"))
        .respond_with(move |req: &Request| {
            let params: Value = serde_json::from_slice(&req.body).unwrap();
            *seen.lock().unwrap() = Some(params["p_items"].clone());
            ResponseTemplate::new(200).set_body_json(json!({
                "id": outfit_id,
                "owner_id": OWNER,
                "name": params["p_name"],
                "notes": null
            }))
        })
        .expect(1)
        .mount(&server)
        .await;

    let items = wardrobe.items().list(&ctx, &ItemFilter::default()).await.unwrap();
    let mut builder = OutfitBuilder::new();
    for item in &items {
        match item.category {
            Category::Top => builder.select(Slot::Base, item.clone()).unwrap(),
            Category::Bottom => builder.select(Slot::Bottom, item.clone()).unwrap(),
            Category::Accessory => {
                builder.toggle_accessory(item.clone()).unwrap();
            }
            _ => {}
        }
    }
    assert!(builder.has_laundry_items());

    let refs = builder.associations().unwrap();
    let outfit = NewOutfit {
        name: Some("Weekend".to_string()),
        ..Default::default()
    };
    let created = wardrobe.outfits().create(&ctx, &outfit, &refs).await.unwrap();
    assert_eq!(created.id, outfit_id);

    let sent = rpc_items.lock().unwrap().clone().unwrap();
    assert_eq!(
        sent,
        json!([
            { "item_id": tee, "slot": "base" },
            { "item_id": jeans, "slot": "bottom" },
            { "item_id": cap, "slot": "accessory" },
            { "item_id": watch, "slot": "accessory" }
        ])
    );

    let saturday = NaiveDate::from_ymd_opt(2024, 6, 8).unwrap();
    Mock::given(method("POST"))
        .and(path("/rest/v1/plans"))
        .respond_with(move |req: &Request| {
            let mut row: Value = serde_json::from_slice(&req.body).unwrap();
            row["id"] = json!(Uuid::new_v4());
            ResponseTemplate::new(201).set_body_json(json!([row]))
        })
        .mount(&server)
        .await;
    let plan = wardrobe
        .plans()
        .upsert(&ctx, saturday, Some(created.id), None)
        .await
        .unwrap();
    assert_eq!(plan.outfit_id, Some(outfit_id));

    Mock::given(method("GET"))
        .and(path("/rest/v1/plans"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": plan.id,
            "owner_id": OWNER,
            "plan_date": "2024-06-08",
            "outfit_id": outfit_id,
            "notes": null,
            "outfit": { "id": outfit_id, "name": "Weekend", "notes": null }
        }])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/outfits"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": outfit_id,
            "owner_id": OWNER,
            "name": "Weekend"
        }])))
        .mount(&server)
        .await;

    let week = WeekPlan::load(&wardrobe, &ctx, saturday).await.unwrap();
    assert_eq!(week.start, NaiveDate::from_ymd_opt(2024, 6, 3).unwrap());
    assert_eq!(week.outfit_name_for(saturday), Some("Weekend"));

    let text = ExportFormat::Txt.render(&items).unwrap();
    let order: Vec<&str> = text
        .lines()
        .filter(|line| line.starts_with('['))
        .collect();
    assert_eq!(order, vec!["[1] Tee", "[2] Jeans", "[3] Cap", "[4] Watch"]);
}
