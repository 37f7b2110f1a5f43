// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! End-to-end analysis pipeline tests
//!
//! Verifies decode -> classify -> Grad-CAM -> overlay with a stub backbone,
//! and (ignored by default) against the exported DenseNet121 model.

use fracture_detection_api::vision::{
    analyze_base64_image, classifier::DevicePreference, AnalysisError, ClassifierConfig,
    FractureClassifier, ImageError,
};
use std::path::Path;

use crate::common::{decode_png, gray_png_base64, stub_classifier, TEST_INPUT_SIZE};

#[test]
fn test_pipeline_produces_prediction_and_overlay() {
    let classifier = stub_classifier();
    let outcome = analyze_base64_image(&classifier, &gray_png_base64(120, 90), None).unwrap();

    assert_eq!(outcome.prediction.label, "fracture");
    assert_eq!(outcome.image_info.width, 120);
    assert_eq!(outcome.image_info.height, 90);

    let overlay = decode_png(&outcome.gradcam_image.unwrap());
    assert_eq!(overlay.dimensions(), (TEST_INPUT_SIZE, TEST_INPUT_SIZE));
}

#[test]
fn test_heatmap_follows_activation() {
    // the stub activates the top-left cell of the fracture channel
    let classifier = stub_classifier();
    let outcome = analyze_base64_image(&classifier, &gray_png_base64(64, 64), None).unwrap();
    let overlay = decode_png(&outcome.gradcam_image.unwrap());

    let last = TEST_INPUT_SIZE - 1;
    let hot = overlay.get_pixel(0, 0).0;
    let cold = overlay.get_pixel(last, last).0;
    assert!(hot[0] > cold[0], "hot {:?} should be redder than cold {:?}", hot, cold);
    assert!(cold[2] > hot[2], "cold {:?} should be bluer than hot {:?}", cold, hot);
}

#[test]
fn test_explain_other_class_gives_flat_map() {
    // the normal channel is all zeros, so its map has no signal
    let classifier = stub_classifier();
    let outcome = analyze_base64_image(&classifier, &gray_png_base64(64, 64), Some(0)).unwrap();
    let overlay = decode_png(&outcome.gradcam_image.unwrap());

    let first = overlay.get_pixel(0, 0).0;
    assert!(overlay.pixels().all(|p| p.0 == first));
}

#[test]
fn test_grayscale_input_is_accepted() {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use image::{GrayImage, ImageFormat, Luma};
    use std::io::Cursor;

    let gray = GrayImage::from_pixel(40, 40, Luma([200]));
    let mut buffer = Cursor::new(Vec::new());
    gray.write_to(&mut buffer, ImageFormat::Png).unwrap();

    let classifier = stub_classifier();
    let outcome =
        analyze_base64_image(&classifier, &STANDARD.encode(buffer.into_inner()), None).unwrap();
    assert_eq!(outcome.prediction.class_index, 1);
}

#[test]
fn test_pipeline_rejects_bad_input() {
    let classifier = stub_classifier();

    let err = analyze_base64_image(&classifier, "", None).unwrap_err();
    assert!(matches!(err, AnalysisError::InvalidImage(ImageError::EmptyData)));

    let err = analyze_base64_image(&classifier, "%%%", None).unwrap_err();
    assert!(matches!(err, AnalysisError::InvalidImage(ImageError::InvalidBase64(_))));

    let err = analyze_base64_image(&classifier, &gray_png_base64(8, 8), Some(2)).unwrap_err();
    assert!(matches!(
        err,
        AnalysisError::InvalidTargetClass {
            target: 2,
            num_classes: 2
        }
    ));
}

#[test]
#[ignore] // Requires the exported DenseNet121 backbone and head
fn test_real_model_end_to_end() {
    let config = ClassifierConfig {
        device: DevicePreference::Cpu,
        ..ClassifierConfig::default()
    };
    if !Path::new(&config.backbone_path).exists() {
        eprintln!("Skipping: {} not found", config.backbone_path.display());
        return;
    }

    let classifier = FractureClassifier::load(&config).expect("Failed to load classifier");
    let outcome = analyze_base64_image(&classifier, &gray_png_base64(512, 512), None).unwrap();

    assert!(outcome.prediction.class_index < 2);
    assert!((0.5..=1.0).contains(&outcome.prediction.confidence));
    let overlay = decode_png(&outcome.gradcam_image.unwrap());
    assert_eq!(overlay.dimensions(), (224, 224));
}
