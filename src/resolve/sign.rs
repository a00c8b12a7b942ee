use futures::future::join_all;

use crate::resolve::model::{FlowScreen, ResolvedImage, StorageObject};
use crate::storage::http::decode_path;
use crate::storage::objects::ObjectStore;

const STORAGE_OBJECT_SEGMENT: &str = "/storage/v1/object/";

/// Object path inside `bucket` if `url` points at our own storage.
///
/// `https://x.supabase.co/storage/v1/object/public/flows/Uber%20iOS/01.png`
/// yields `Uber%20iOS/01.png` (still encoded).
pub fn storage_object_path<'a>(url: &'a str, bucket: &str) -> Option<&'a str> {
    if !url.contains(STORAGE_OBJECT_SEGMENT) {
        return None;
    }
    let marker = format!("/{}/", bucket);
    let idx = url.find(&marker)?;
    Some(&url[idx + marker.len()..])
}

/// Re-sign catalog screens that live in our bucket.
///
/// Runs every signing call at once; results keep the input order. Screens
/// without an image are dropped, external URLs and failed signatures keep the
/// stored URL.
pub async fn sign_catalog_screens(
    objects: &dyn ObjectStore,
    screens: Vec<FlowScreen>,
    ttl_secs: u64,
) -> Vec<ResolvedImage> {
    let bucket = objects.bucket();

    let signing = screens.into_iter().filter_map(|screen| {
        let FlowScreen {
            order_index,
            image_url,
            caption,
            ..
        } = screen;
        let stored = image_url.filter(|url| !url.is_empty())?;

        Some(async move {
            let signed = match storage_object_path(&stored, bucket) {
                Some(path) => objects.sign(&decode_path(path), ttl_secs).await,
                None => None,
            };

            ResolvedImage {
                order: order_index,
                image_url: signed.unwrap_or(stored),
                caption,
            }
        })
    });

    join_all(signing).await
}

/// Sign listed objects, numbering them 1..n in the given order.
///
/// A failed signature falls back to the unsigned public URL so every image
/// still has somewhere to load from.
pub async fn sign_listed_objects(
    objects: &dyn ObjectStore,
    listed: Vec<StorageObject>,
    ttl_secs: u64,
) -> Vec<ResolvedImage> {
    let signing = listed.into_iter().enumerate().map(|(i, object)| async move {
        let decoded = decode_path(&object.path);
        let image_url = match objects.sign(&decoded, ttl_secs).await {
            Some(url) => url,
            None => objects.public_url(&decoded),
        };

        ResolvedImage {
            order: i as i64 + 1,
            image_url,
            caption: None,
        }
    });

    join_all(signing).await
}
