#![allow(dead_code)]

use std::io::Cursor;

use claimdesk_claims::ClaimService;
use claimdesk_core::{Category, NewClaim, ReceiptUpload};
use claimdesk_store::{InMemoryClaimStore, InMemoryReceiptStorage};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use rust_decimal::Decimal;
use uuid::Uuid;

pub type Service = ClaimService<InMemoryClaimStore, InMemoryReceiptStorage>;

pub struct Harness {
    pub service: Service,
    pub store: InMemoryClaimStore,
    pub receipts: InMemoryReceiptStorage,
    pub employee_id: Uuid,
    pub admin_id: Uuid,
}

impl Harness {
    pub async fn new(fuel_limit: i64, opd_limit: i64) -> Self {
        let store = InMemoryClaimStore::default();
        let receipts = InMemoryReceiptStorage::default();
        let service = ClaimService::new(store.clone(), receipts.clone());
        let employee_id = Uuid::new_v4();

        service
            .open_credit_accounts(employee_id, dec(fuel_limit), dec(opd_limit))
            .await
            .unwrap();

        Self {
            service,
            store,
            receipts,
            employee_id,
            admin_id: Uuid::new_v4(),
        }
    }

    pub fn claim(&self, category: Category, amount: i64, images: Vec<ReceiptUpload>) -> NewClaim {
        NewClaim {
            employee_id: self.employee_id,
            category,
            amount: dec(amount),
            message: "monthly reimbursement".to_string(),
            images,
        }
    }

    pub async fn balance(&self, category: Category) -> Decimal {
        let summary = self.service.credit_summary(self.employee_id).await.unwrap();
        match category {
            Category::Fuel => summary.fuel.balance,
            Category::Opd => summary.opd.balance,
            Category::Stationary => panic!("stationary has no balance"),
        }
    }
}

pub fn dec(value: i64) -> Decimal {
    Decimal::new(value, 0)
}

fn mix(seed: u32, bx: u32, by: u32) -> u8 {
    let mut value = seed.wrapping_mul(0x9E37_79B1)
        ^ bx.wrapping_mul(0x85EB_CA6B)
        ^ by.wrapping_mul(0xC2B2_AE35);
    value ^= value >> 15;
    value = value.wrapping_mul(0x2C1B_3C6D);
    value ^= value >> 12;
    (value & 0xff) as u8
}

/// A receipt-like PNG whose content is determined by `seed`.
pub fn receipt(seed: u32) -> ReceiptUpload {
    receipt_named(seed, &format!("receipt-{seed}.png"))
}

pub fn receipt_named(seed: u32, file_name: &str) -> ReceiptUpload {
    let image = RgbImage::from_fn(64, 64, |x, y| {
        let shade = mix(seed, x / 8, y / 8);
        Rgb([shade, shade, shade])
    });
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();

    ReceiptUpload {
        file_name: file_name.to_string(),
        bytes,
    }
}
