//! Durability across a real process restart (testable property 5).
//!
//! The only thing that genuinely needs a spawned subprocess rather than an
//! in-process `tower::oneshot` call: proving the sled store and sidecar file
//! survive a clean shutdown and a fresh `main()` reopening the same paths.

mod common;

use common::test_harness::{cleanup_test_env, setup_test_env, TestServer};

#[test]
fn completed_artifact_survives_restart() {
    let env = setup_test_env();

    let server = TestServer::start(env);
    let base = server.base_url();
    let client = reqwest::blocking::Client::new();

    let submit: serde_json::Value = client
        .post(format!("{base}/request"))
        .json(&serde_json::json!({"prompt": "a red square"}))
        .send()
        .unwrap()
        .json()
        .unwrap();
    let task_id = submit["task_id"].as_str().unwrap().to_string();

    let claimed: serde_json::Value = client.get(format!("{base}/task")).send().unwrap().json().unwrap();
    assert_eq!(claimed["task_id"].as_str().unwrap(), task_id);

    let png = red_png_2x2();
    let part = reqwest::blocking::multipart::Part::bytes(png).file_name("image.png");
    let form = reqwest::blocking::multipart::Form::new().part("image", part);
    let resp = client
        .post(format!("{base}/complete/{task_id}"))
        .multipart(form)
        .send()
        .unwrap();
    assert!(resp.status().is_success());

    let downloaded_before = client
        .get(format!("{base}/download/{task_id}"))
        .send()
        .unwrap()
        .bytes()
        .unwrap()
        .to_vec();

    let env = server.shutdown();

    let server = TestServer::start(env);
    let base = server.base_url();

    let downloaded_after = client
        .get(format!("{base}/download/{task_id}"))
        .send()
        .unwrap()
        .bytes()
        .unwrap()
        .to_vec();

    assert_eq!(downloaded_before, downloaded_after);

    let env = server.shutdown();
    cleanup_test_env(env);
}

fn red_png_2x2() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(2, 2, image::Rgb([255, 0, 0]));
    let mut buf = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, image::ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}
