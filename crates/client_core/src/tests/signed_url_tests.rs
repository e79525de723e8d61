use super::*;
use async_trait::async_trait;
use tokio::sync::Mutex;

#[derive(Default)]
struct MemoryObjects {
    uploads: Mutex<Vec<(String, String, usize)>>,
    removed: Mutex<Vec<String>>,
    fail_with: Option<String>,
}

#[async_trait]
impl ObjectStore for MemoryObjects {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> ClientResult<()> {
        assert_eq!(bucket, DEFAULT_BUCKET);
        self.uploads
            .lock()
            .await
            .push((path.to_string(), content_type.to_string(), bytes.len()));
        Ok(())
    }

    async fn create_signed_url(
        &self,
        bucket: &str,
        path: &str,
        expires_in: Duration,
    ) -> ClientResult<String> {
        if let Some(err) = &self.fail_with {
            return Err(ClientError::Transport(err.clone()));
        }
        Ok(format!(
            "https://proj.example.co/storage/v1/object/sign/{bucket}/{path}?token=t{}",
            expires_in.as_secs()
        ))
    }

    async fn remove(&self, _bucket: &str, paths: Vec<String>) -> ClientResult<()> {
        self.removed.lock().await.extend(paths);
        Ok(())
    }
}

fn broker() -> (Arc<MemoryObjects>, SignedUrlBroker) {
    let objects = Arc::new(MemoryObjects::default());
    let broker = SignedUrlBroker::new(objects.clone(), DEFAULT_BUCKET);
    (objects, broker)
}

fn png(size: usize) -> ImageUpload {
    ImageUpload {
        file_name: "card.PNG".into(),
        content_type: "image/png".into(),
        bytes: vec![1; size],
    }
}

#[test]
fn object_path_accepts_signed_urls_and_bare_paths() {
    let (_, broker) = broker();
    assert_eq!(
        broker.object_path(
            "https://proj.example.co/storage/v1/object/sign/cnic-images/u1/front-1.png?token=abc"
        ),
        Some("u1/front-1.png".to_string())
    );
    assert_eq!(
        broker.object_path("cnic-images/u1/back-2.jpg?token=abc"),
        Some("u1/back-2.jpg".to_string())
    );
    assert_eq!(
        broker.object_path("u1/back-2.jpg"),
        Some("u1/back-2.jpg".to_string())
    );
    assert_eq!(
        broker.object_path("https://proj.example.co/storage/v1/object/sign/other/x.png"),
        None
    );
    assert_eq!(broker.object_path("  "), None);
}

#[test]
fn image_validation_messages() {
    assert!(png(10).validate().is_ok());
    let err = ImageUpload {
        content_type: "application/pdf".into(),
        ..png(10)
    }
    .validate()
    .expect_err("not an image");
    assert_eq!(err.to_string(), "Please select an image file");
    let err = png(MAX_IMAGE_BYTES + 1).validate().expect_err("too big");
    assert_eq!(err.to_string(), "Image must be less than 5MB");
    assert!(png(MAX_IMAGE_BYTES).validate().is_ok());
}

#[tokio::test]
async fn signed_links_last_seven_days() {
    let (_, broker) = broker();
    let signed = broker.sign("u1/front-1.png").await.expect("sign");
    assert_eq!(signed.expires_at - signed.issued_at, chrono::Duration::days(7));
    assert!(signed.url.ends_with("?token=t604800"));
    assert_eq!(signed.path, "u1/front-1.png");
}

#[tokio::test]
async fn resign_rejects_unresolvable_reference() {
    let (_, broker) = broker();
    let err = broker.resign("").await.expect_err("empty reference");
    assert_eq!(err.to_string(), "Invalid URL format");
    assert_eq!(broker.resign_optional(None).await.expect("none"), None);
}

#[tokio::test]
async fn refresh_keeps_original_link_when_signing_fails() {
    let objects = Arc::new(MemoryObjects {
        fail_with: Some("storage offline".into()),
        ..MemoryObjects::default()
    });
    let broker = SignedUrlBroker::new(objects, DEFAULT_BUCKET);
    let original = "https://proj.example.co/storage/v1/object/sign/cnic-images/u1/a.png?token=old";
    assert_eq!(broker.refresh(original).await, original);
}

#[tokio::test]
async fn upload_names_object_by_owner_and_kind() {
    let (objects, broker) = broker();
    let owner = EmployeeId(uuid::Uuid::nil());
    let signed = broker
        .upload(owner, ImageKind::Back, png(64))
        .await
        .expect("upload");

    let uploads = objects.uploads.lock().await.clone();
    assert_eq!(uploads.len(), 1);
    let (path, content_type, size) = &uploads[0];
    assert!(path.starts_with(&format!("{owner}/back-")));
    assert!(path.ends_with(".PNG"));
    assert_eq!(content_type, "image/png");
    assert_eq!(*size, 64);
    assert_eq!(&signed.path, path);

    assert!(broker
        .upload_optional(owner, ImageKind::Front, None)
        .await
        .expect("nothing to upload")
        .is_none());
}

#[tokio::test]
async fn delete_skips_missing_references() {
    let (objects, broker) = broker();
    broker.delete(None).await.expect("nothing");
    broker.delete(Some("")).await.expect("unresolvable");
    broker
        .delete(Some("cnic-images/u1/front-1.png?token=x"))
        .await
        .expect("delete");
    assert_eq!(
        objects.removed.lock().await.clone(),
        vec!["u1/front-1.png".to_string()]
    );
}
