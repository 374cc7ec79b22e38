mod common;

use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use common::solid_png;
use snapshare_lib::capture::resources::slot_source;
use snapshare_lib::clipboard::{ClipboardBackend, ClipboardError, ClipboardImage};
use snapshare_lib::persistence::{NamingContext, PersistenceClient, PersistenceError};
use snapshare_lib::storage::MemoryStore;
use snapshare_lib::surface::{Color, Rect, Surface, SurfaceBuilder, SurfaceSize};
use snapshare_lib::{
    copy_to_clipboard, CaptureEngine, CaptureOptions, RasterArtifact, SnapshareError,
};
use tempfile::TempDir;

const SLOT_COLORS: [[u8; 4]; 4] = [
    [220, 40, 40, 255],
    [40, 200, 60, 255],
    [30, 60, 220, 255],
    [240, 200, 20, 255],
];

fn slot_bounds(index: usize) -> Rect {
    Rect::new(10.0 + index as f32 * 60.0, 10.0, 50.0, 50.0)
}

fn porosity_surface() -> Surface {
    let mut builder = SurfaceBuilder::new(SurfaceSize::new(260, 120))
        .background(Color::rgb(255, 255, 255))
        .text(10.0, 80.0, "Porosity 59.77%", 16.0);
    for index in 0..SLOT_COLORS.len() {
        builder = builder.image_slot(index, slot_bounds(index));
    }
    builder.build()
}

fn data_url(png: &[u8]) -> String {
    format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(png)
    )
}

fn engine() -> CaptureEngine {
    CaptureEngine::new(Duration::from_secs(2)).unwrap()
}

fn noise_png(width: u32, height: u32) -> Vec<u8> {
    use image::{codecs::png::PngEncoder, ColorType, ImageEncoder};

    let mut state: u32 = 0x1234_5678;
    let pixels: Vec<u8> = (0..width * height * 4)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state >> 24) as u8
        })
        .collect();
    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes)
        .write_image(&pixels, width, height, ColorType::Rgba8)
        .unwrap();
    bytes
}

#[tokio::test]
async fn filled_slots_render_their_images() {
    let dir = TempDir::new().unwrap();
    let mut surface = porosity_surface();

    for (index, color) in SLOT_COLORS.iter().enumerate() {
        let png = solid_png(8, 8, *color);
        let src = if index % 2 == 0 {
            data_url(&png)
        } else {
            let path = dir.path().join(format!("slot-{index}.png"));
            std::fs::write(&path, &png).unwrap();
            slot_source(path.to_str().unwrap()).await.unwrap()
        };
        assert!(src.starts_with("data:image/png;base64,"));
        assert!(surface.fill_slot(index, src));
    }

    let artifact = engine()
        .capture(&surface, &CaptureOptions::default())
        .await
        .unwrap();
    assert_eq!((artifact.width(), artifact.height()), (260, 120));

    let decoded = image::load_from_memory(artifact.bytes()).unwrap().to_rgba8();
    for (index, color) in SLOT_COLORS.iter().enumerate() {
        let bounds = slot_bounds(index);
        let x = (bounds.x + bounds.width / 2.0) as u32;
        let y = (bounds.y + bounds.height / 2.0) as u32;
        assert_eq!(decoded.get_pixel(x, y).0, *color, "slot {index}");
    }
    assert_eq!(decoded.get_pixel(255, 5).0, [255, 255, 255, 255]);
}

#[tokio::test]
async fn each_upload_writes_one_row_and_failures_write_none() {
    let store = Arc::new(MemoryStore::new());
    let persistence = PersistenceClient::new(store.clone(), store.clone());
    let surface = porosity_surface();
    let options = CaptureOptions::default();

    for _ in 0..3 {
        let artifact = engine().capture(&surface, &options).await.unwrap();
        persistence
            .upload(artifact, &NamingContext::default())
            .await
            .unwrap();
    }
    assert_eq!(store.record_count(), 3);
    assert_eq!(store.blob_count(), 3);

    store.fail_next_put("bucket is read-only");
    let artifact = engine().capture(&surface, &options).await.unwrap();
    let err = persistence
        .upload(artifact, &NamingContext::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PersistenceError::Upload(_)));
    assert_eq!(store.record_count(), 3);
    assert_eq!(store.blob_count(), 3);

    let ids: Vec<String> = store
        .records()
        .iter()
        .map(|record| record.id.to_string())
        .collect();
    assert_eq!(ids, vec!["1", "2", "3"]);
}

#[tokio::test]
async fn large_raster_is_stored_under_a_timestamp_key() {
    let bytes = noise_png(760, 720);
    assert!(bytes.len() > 2_000_000, "noise PNG is {} bytes", bytes.len());

    let store = Arc::new(MemoryStore::new());
    let persistence = PersistenceClient::new(store.clone(), store.clone());
    let artifact = RasterArtifact::from_png(bytes.clone()).unwrap();

    let record = persistence
        .upload(artifact, &NamingContext::default())
        .await
        .unwrap();

    let keys = store.blob_keys();
    assert_eq!(keys.len(), 1);
    let digits = keys[0]
        .strip_prefix("screenshots/")
        .and_then(|rest| rest.strip_suffix(".png"))
        .unwrap();
    assert!(!digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()));
    assert_eq!(store.blob(&keys[0]).unwrap(), bytes);
    assert!(record.blob_address.as_str().ends_with(&keys[0]));
}

struct HeadlessClipboard;

impl ClipboardBackend for HeadlessClipboard {
    fn set_image(&self, _image: ClipboardImage) -> Result<(), ClipboardError> {
        Err(ClipboardError::Unsupported)
    }

    fn set_text(&self, _text: &str) -> Result<(), ClipboardError> {
        Err(ClipboardError::Unsupported)
    }
}

#[tokio::test]
async fn unsupported_clipboard_is_a_typed_failure() {
    let artifact = RasterArtifact::from_png(solid_png(4, 4, [0, 0, 0, 255])).unwrap();

    let err = copy_to_clipboard(&artifact, Arc::new(HeadlessClipboard))
        .await
        .unwrap_err();
    assert_eq!(err, ClipboardError::Unsupported);

    let err = SnapshareError::from(err);
    assert_eq!(err.notification(), "Failed to copy screenshot to clipboard.");
    assert_eq!(
        serde_json::to_value(err.to_payload()).unwrap()["category"],
        "clipboard"
    );
}

#[tokio::test]
async fn surface_file_loads_and_captures() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("preview.json");
    std::fs::write(
        &path,
        r##"{
            "size": {"width": 40, "height": 30},
            "background": "#ffffff",
            "root": {"type": "group", "children": [
                {"type": "rect", "bounds": {"x": 0, "y": 0, "width": 20, "height": 30}, "fill": "#000000"},
                {"type": "image", "bounds": {"x": 20, "y": 0, "width": 20, "height": 30}, "src": "", "slot": 0}
            ]}
        }"##,
    )
    .unwrap();

    let mut surface = Surface::load(&path).unwrap();
    assert!(surface.fill_slot(0, data_url(&solid_png(2, 2, [0, 0, 255, 255]))));

    let artifact = engine()
        .capture(&surface, &CaptureOptions::default())
        .await
        .unwrap();
    let decoded = image::load_from_memory(artifact.bytes()).unwrap().to_rgba8();
    assert_eq!(decoded.get_pixel(5, 15).0, [0, 0, 0, 255]);
    assert_eq!(decoded.get_pixel(30, 15).0, [0, 0, 255, 255]);
}
