use super::{NewProduct, Product};
use chrono::{DateTime, Duration, Utc};

/// The storefront's sample catalog
fn sample_catalog() -> Vec<NewProduct> {
    [
        (
            "Leather Handbag",
            "Elegant leather handbag with gold accents. Perfect for any occasion.",
            129900,
            "https://images.unsplash.com/photo-1584917865442-de89df76afd3?auto=format&fit=crop&w=870&q=80",
        ),
        (
            "Designer Sunglasses",
            "Stylish sunglasses with UV protection. Made with premium materials.",
            39900,
            "https://images.unsplash.com/photo-1572635196237-14b3f281503f?auto=format&fit=crop&w=880&q=80",
        ),
        (
            "Silk Scarf",
            "Luxurious silk scarf with a unique pattern. Adds elegance to any outfit.",
            24900,
            "https://images.unsplash.com/photo-1584917865442-de89df76afd3?auto=format&fit=crop&w=870&q=80",
        ),
        (
            "Leather Wallet",
            "Handcrafted leather wallet with multiple card slots and a coin pocket.",
            19900,
            "https://images.unsplash.com/photo-1627123424574-724758594e93?auto=format&fit=crop&w=774&q=80",
        ),
        (
            "Designer Watch",
            "Elegant watch with a stainless steel case and leather strap.",
            299900,
            "https://images.unsplash.com/photo-1524805444758-089113d48a6d?auto=format&fit=crop&w=776&q=80",
        ),
        (
            "Leather Belt",
            "Premium leather belt with a designer buckle. Perfect for formal occasions.",
            14900,
            "https://images.unsplash.com/photo-1624222247344-550fb60583dc?auto=format&fit=crop&w=870&q=80",
        ),
        (
            "Designer Shoes",
            "Handcrafted leather shoes with a unique design. Comfortable and stylish.",
            89900,
            "https://images.unsplash.com/photo-1543163521-1bf539c55dd2?auto=format&fit=crop&w=880&q=80",
        ),
        (
            "Silk Tie",
            "Luxurious silk tie with a unique pattern. Perfect for formal occasions.",
            12900,
            "https://images.unsplash.com/photo-1598532213005-76f745254959?auto=format&fit=crop&w=778&q=80",
        ),
    ]
    .into_iter()
    .map(|(name, description, price, image_url)| NewProduct {
        name: name.to_string(),
        description: description.to_string(),
        price,
        image_url: image_url.to_string(),
    })
    .collect()
}

/// The sample catalog as stored products with ids "1" to "8"
///
/// Creation times are a minute apart, ending just before `now`, so later
/// entries sort as newer.
pub fn sample_products(now: DateTime<Utc>) -> Vec<Product> {
    let catalog = sample_catalog();
    let count = catalog.len() as i64;
    catalog
        .into_iter()
        .enumerate()
        .map(|(index, product)| {
            let created_at = now - Duration::minutes(count - index as i64);
            Product {
                id: (index + 1).to_string(),
                name: product.name,
                description: product.description,
                price: product.price,
                image_url: product.image_url,
                created_at,
                updated_at: created_at,
            }
        })
        .collect()
}
