use claimdesk_core::{ClaimError, PerceptualHash, ReceiptUpload};
use claimdesk_fingerprint::fingerprint;

/// An upload that passed format checks, with its fingerprint.
#[derive(Debug, Clone)]
pub struct ScreenedReceipt {
    pub upload: ReceiptUpload,
    pub extension: String,
    pub hash: PerceptualHash,
}

/// Validates and fingerprints every upload. Any unreadable or unsupported
/// file fails the whole batch.
pub fn screen_uploads(uploads: Vec<ReceiptUpload>) -> Result<Vec<ScreenedReceipt>, ClaimError> {
    if uploads.is_empty() {
        return Err(ClaimError::Validation(
            "no images uploaded; attach at least one image of the invoice".to_string(),
        ));
    }

    uploads
        .into_iter()
        .map(|upload| {
            let Some(extension) = upload.extension() else {
                return Err(ClaimError::InvalidImage {
                    file_name: upload.file_name,
                    reason: "only PNG, JPG, or JPEG images are accepted".to_string(),
                });
            };
            let hash = fingerprint(&upload.bytes).map_err(|err| ClaimError::InvalidImage {
                file_name: upload.file_name.clone(),
                reason: err.to_string(),
            })?;

            Ok(ScreenedReceipt {
                upload,
                extension,
                hash,
            })
        })
        .collect()
}

pub async fn screen_uploads_blocking(
    uploads: Vec<ReceiptUpload>,
) -> Result<Vec<ScreenedReceipt>, ClaimError> {
    tokio::task::spawn_blocking(move || screen_uploads(uploads))
        .await
        .map_err(|err| ClaimError::Storage(format!("receipt screening task failed: {err}")))?
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

    use super::*;

    fn png(shade: u8) -> Vec<u8> {
        let image = RgbImage::from_fn(32, 32, |x, _| {
            if x < 16 {
                Rgb([shade, shade, shade])
            } else {
                Rgb([255 - shade, 0, 0])
            }
        });
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn upload(file_name: &str, bytes: Vec<u8>) -> ReceiptUpload {
        ReceiptUpload {
            file_name: file_name.to_string(),
            bytes,
        }
    }

    #[test]
    fn empty_submission_is_a_validation_error() {
        assert!(matches!(
            screen_uploads(Vec::new()),
            Err(ClaimError::Validation(_))
        ));
    }

    #[test]
    fn unsupported_extension_is_rejected_by_name() {
        let err = screen_uploads(vec![
            upload("bill.png", png(10)),
            upload("bill.gif", png(10)),
        ])
        .unwrap_err();

        assert!(matches!(err, ClaimError::InvalidImage { file_name, .. } if file_name == "bill.gif"));
    }

    #[test]
    fn undecodable_bytes_are_invalid_image() {
        let err = screen_uploads(vec![upload("scan.jpg", b"garbage".to_vec())]).unwrap_err();
        assert!(matches!(err, ClaimError::InvalidImage { .. }));
    }

    #[test]
    fn every_upload_gets_a_fingerprint() {
        let screened =
            screen_uploads(vec![upload("a.PNG", png(20)), upload("b.png", png(200))]).unwrap();

        assert_eq!(screened.len(), 2);
        assert_eq!(screened[0].extension, "png");
        assert_eq!(screened[1].upload.file_name, "b.png");
    }
}
