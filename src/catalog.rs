//! Item workflows that span the table and the object store

use futures_util::future::join_all;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::media::Upload;
use crate::models::{Item, ItemPatch, NewItem, OutfitWithItems};
use crate::session::AuthContext;
use crate::Wardrobe;

impl Wardrobe {
    /// Store the files under a fresh id, then insert the row with that id
    pub async fn add_item(
        &self,
        ctx: &AuthContext,
        mut item: NewItem,
        image: Option<&Upload>,
        detail_html: Option<&str>,
    ) -> Result<Item> {
        let id = Uuid::new_v4();
        let media = self.media();

        if let Some(image) = image {
            item.image_path = Some(media.upload_image(ctx, id, image).await?);
        }
        if let Some(html) = detail_html {
            item.detail_path = Some(media.upload_detail(ctx, id, html).await?);
        }

        self.items().create_with_id(ctx, id, &item).await
    }

    /// Apply `patch`; new files overwrite the stored ones, missing files
    /// leave the current paths alone
    pub async fn edit_item(
        &self,
        ctx: &AuthContext,
        id: Uuid,
        mut patch: ItemPatch,
        image: Option<&Upload>,
        detail_html: Option<&str>,
    ) -> Result<Item> {
        let current = self
            .items()
            .get(ctx, id)
            .await?
            .ok_or_else(|| Error::validation(format!("item {} not found", id)))?;
        let media = self.media();

        let mut stale_image = None;
        if let Some(image) = image {
            let path = media.upload_image(ctx, id, image).await?;
            if current.image_path.as_deref().map_or(false, |old| old != path) {
                stale_image = current.image_path.clone();
            }
            patch.image_path = Some(Some(path));
        }
        if let Some(html) = detail_html {
            patch.detail_path = Some(Some(media.upload_detail(ctx, id, html).await?));
        }

        let updated = self.items().update(ctx, id, &patch).await?;

        // A new extension means a new key; the old object would be orphaned
        if let Some(old) = stale_image {
            if let Err(e) = media.remove(ctx, &[old.as_str()]).await {
                tracing::warn!(item_id = %id, path = %old, error = %e, "failed to remove replaced image");
            }
        }
        Ok(updated)
    }

    /// Remove the item's files, then its row
    pub async fn discard_item(&self, ctx: &AuthContext, item: &Item) -> Result<()> {
        let paths: Vec<&str> = [item.image_path.as_deref(), item.detail_path.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        self.media().remove(ctx, &paths).await?;
        self.items().delete(ctx, item.id).await
    }

    /// Signed image URLs for every item that has an image. Items whose URL
    /// cannot be produced are logged and left out.
    pub async fn signed_urls(&self, ctx: &AuthContext, items: &[Item]) -> HashMap<Uuid, String> {
        let media = self.media();
        let requests = items.iter().filter_map(|item| {
            let path = item.image_path.as_deref()?;
            let media = &media;
            Some(async move { (item.id, media.signed_url(ctx, path).await) })
        });

        join_all(requests)
            .await
            .into_iter()
            .filter_map(|(id, result)| match result {
                Ok(url) => Some((id, url)),
                Err(e) => {
                    tracing::warn!(item_id = %id, error = %e, "failed to load image URL");
                    None
                }
            })
            .collect()
    }

    /// Signed URL of an item's detail document, if it has one
    pub async fn detail_url(&self, ctx: &AuthContext, item: &Item) -> Result<Option<String>> {
        match item.detail_path.as_deref() {
            Some(path) => Ok(Some(self.media().signed_url(ctx, path).await?)),
            None => Ok(None),
        }
    }

    /// An outfit's resolved items together with their image URLs
    pub async fn view_outfit(
        &self,
        ctx: &AuthContext,
        id: Uuid,
    ) -> Result<Option<(OutfitWithItems, HashMap<Uuid, String>)>> {
        let Some(outfit) = self.outfits().get_with_items(ctx, id).await? else {
            return Ok(None);
        };
        let items: Vec<Item> = outfit.items.iter().map(|s| s.item.clone()).collect();
        let urls = self.signed_urls(ctx, &items).await;
        Ok(Some((outfit, urls)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, ItemStatus};
    use crate::test_support::{ctx, item_json, wardrobe, OWNER};
    use serde_json::{json, Value};
    use wiremock::matchers::{body_json, method, path, path_regex, query_param};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    const ITEM: &str = "0f8e3f1c-8a6b-4c38-9a8e-2d9a4f1b7c11";

    fn item_with_image(id: &str, image: Option<&str>) -> Item {
        let mut row = item_json(id, "top", "Tee");
        row["image_path"] = json!(image);
        serde_json::from_value(row).unwrap()
    }

    #[tokio::test]
    async fn add_item_uploads_under_the_row_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(format!(r"^/storage/v1/object/wardrobe/{}/items/[0-9a-f-]{{36}}\.jpg$", OWNER)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Key": "k" })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path_regex(format!(r"^/storage/v1/object/wardrobe/{}/items/[0-9a-f-]{{36}}/detail\.html$", OWNER)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Key": "k" })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/items"))
            .respond_with(|req: &Request| {
                let row: Value = serde_json::from_slice(&req.body).unwrap();
                ResponseTemplate::new(201).set_body_json(json!([row]))
            })
            .expect(1)
            .mount(&server)
            .await;

        let created = wardrobe(&server)
            .add_item(
                &ctx(),
                NewItem::new(Category::Top).with_name("Linen shirt"),
                Some(&Upload::new("IMG_0042.jpg", vec![0xffu8, 0xd8])),
                Some("<p>hand wash</p>"),
            )
            .await
            .unwrap();

        assert_eq!(
            created.image_path,
            Some(format!("{}/items/{}.jpg", OWNER, created.id))
        );
        assert_eq!(
            created.detail_path,
            Some(format!("{}/items/{}/detail.html", OWNER, created.id))
        );
    }

    #[tokio::test]
    async fn failed_upload_creates_no_row() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"^/storage/v1/object/wardrobe/.*"))
            .respond_with(ResponseTemplate::new(413).set_body_json(json!({ "message": "Payload too large" })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/items"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let err = wardrobe(&server)
            .add_item(
                &ctx(),
                NewItem::new(Category::Shoes),
                Some(&Upload::new("boots.png", vec![1u8])),
                None,
            )
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("failed to upload image"));
    }

    #[tokio::test]
    async fn edit_with_new_extension_removes_the_old_image() {
        let server = MockServer::start().await;
        let old = format!("{}/items/{}.png", OWNER, ITEM);
        let new = format!("{}/items/{}.webp", OWNER, ITEM);

        let mut row = item_json(ITEM, "top", "Tee");
        row["image_path"] = json!(old);
        Mock::given(method("GET"))
            .and(path("/rest/v1/items"))
            .respond_with(ResponseTemplate::new(200).set_body_json(row.clone()))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("/storage/v1/object/wardrobe/{}", new)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Key": "k" })))
            .expect(1)
            .mount(&server)
            .await;
        row["image_path"] = json!(new);
        row["status"] = json!("laundry");
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/items"))
            .and(query_param("id", format!("eq.{}", ITEM).as_str()))
            .and(body_json(json!({ "status": "laundry", "image_path": new })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/storage/v1/object/wardrobe"))
            .and(body_json(json!({ "prefixes": [old] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let patch = ItemPatch {
            status: Some(ItemStatus::Laundry),
            ..Default::default()
        };
        let updated = wardrobe(&server)
            .edit_item(
                &ctx(),
                Uuid::parse_str(ITEM).unwrap(),
                patch,
                Some(&Upload::new("tee.webp", vec![1u8])),
                None,
            )
            .await
            .unwrap();
        assert_eq!(updated.image_path.as_deref(), Some(new.as_str()));
        assert_eq!(updated.status, ItemStatus::Laundry);
    }

    #[tokio::test]
    async fn discard_removes_files_before_the_row() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/storage/v1/object/wardrobe"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/rest/v1/items"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let mut item = item_with_image(ITEM, Some("o/items/i.png"));
        item.detail_path = Some("o/items/i/detail.html".to_string());
        wardrobe(&server).discard_item(&ctx(), &item).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let paths: Vec<&str> = requests.iter().map(|r| r.url.path()).collect();
        assert_eq!(paths, vec!["/storage/v1/object/wardrobe", "/rest/v1/items"]);
        let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body, json!({ "prefixes": ["o/items/i.png", "o/items/i/detail.html"] }));
    }

    #[tokio::test]
    async fn discard_without_files_skips_storage() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/rest/v1/items"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let item = item_with_image(ITEM, None);
        wardrobe(&server).discard_item(&ctx(), &item).await.unwrap();
    }

    #[tokio::test]
    async fn signed_urls_skip_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/storage/v1/object/sign/wardrobe/o/items/good.png"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "signedURL": "/object/sign/wardrobe/o/items/good.png?token=t"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/storage/v1/object/sign/wardrobe/o/items/gone.png"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "Object not found" })))
            .mount(&server)
            .await;

        let good = item_with_image("11111111-1111-4111-8111-111111111111", Some("o/items/good.png"));
        let gone = item_with_image("22222222-2222-4222-8222-222222222222", Some("o/items/gone.png"));
        let bare = item_with_image("33333333-3333-4333-8333-333333333333", None);

        let urls = wardrobe(&server)
            .signed_urls(&ctx(), &[good.clone(), gone, bare])
            .await;
        assert_eq!(urls.len(), 1);
        assert_eq!(
            urls.get(&good.id).map(String::as_str),
            Some(format!("{}/storage/v1/object/sign/wardrobe/o/items/good.png?token=t", server.uri()).as_str())
        );
    }
}
