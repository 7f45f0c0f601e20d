diesel::table! {
    products (id) {
        id -> Text,
        name -> Text,
        description -> Text,
        price -> BigInt,
        image_url -> Text,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    users (id) {
        id -> Text,
        name -> Nullable<Text>,
        email -> Nullable<Text>,
        image -> Nullable<Text>,
    }
}

diesel::table! {
    carts (id) {
        id -> Text,
        user_id -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    cart_items (id) {
        id -> Text,
        cart_id -> Text,
        product_id -> Text,
        quantity -> BigInt,
    }
}

diesel::joinable!(cart_items -> carts (cart_id));
diesel::joinable!(cart_items -> products (product_id));
diesel::joinable!(carts -> users (user_id));

diesel::allow_tables_to_appear_in_same_query!(cart_items, carts, products, users,);
