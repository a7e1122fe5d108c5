use crate::{
    db_types::{Cents, NewProduct, NewUser, Product, ShippingAddress, User},
    SqliteDatabase,
};

pub async fn seed_user(db: &SqliteDatabase, email: &str, business_name: &str) -> User {
    db.insert_user(NewUser::new(email, business_name)).await.expect("Error inserting user")
}

pub async fn seed_product(db: &SqliteDatabase, name: &str, price: i64, stock: i64, business_id: i64) -> Product {
    let product = NewProduct::new(name, Cents::from(price), stock, business_id)
        .with_description(format!("{name} (test fixture)"))
        .with_image_url(format!("https://cdn.example.com/{}.png", name.to_lowercase().replace(' ', "-")));
    db.insert_product(product).await.expect("Error inserting product")
}

pub fn sample_address() -> ShippingAddress {
    ShippingAddress {
        full_name: "Ada Lovelace".into(),
        line1: "1 Analytical Way".into(),
        line2: None,
        city: "London".into(),
        state: None,
        postal_code: "N1 9GU".into(),
        country: "GB".into(),
        phone: Some("+44 20 7946 0000".into()),
    }
}
