use crate::models::{ItemForm, Profile};
use crate::theme::Theme;
use maud::{html, Markup, DOCTYPE};
use pantry_core::{AggregateView, Category, CategoryFilter, Classification, ExpiryStatus, Item};

pub const PLACEHOLDER_IMAGE: &str = "/static/placeholder.svg";

pub fn base_layout(title: &str, theme: Theme, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) " - Pantry" }
                link rel="stylesheet" href="/static/style.css";
            }
            body class=(theme.css_class()) {
                header class="main-header" {
                    div class="container" {
                        div class="header-content" {
                            h1 {
                                a href="/" class="logo" { "Pantry" }
                            }
                            nav {
                                a href="/inventory" class="nav-link" { "Inventory" }
                                a href="/items/new" class="nav-link" { "Add Item" }
                                a href="/notifications" class="nav-link" { "Alerts" }
                                a href="/profile" class="nav-link" { "Profile" }
                                form method="post" action="/theme/toggle" class="inline-form" {
                                    button type="submit" class="btn btn-link" {
                                        @match theme {
                                            Theme::Light => { "Dark mode" },
                                            Theme::Dark => { "Light mode" },
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
                main class="container" {
                    (content)
                }
                footer {
                    div class="container" {
                        p { "Pantry - Smart Expiry Tracker" }
                    }
                }
            }
        }
    }
}

fn item_image(item: &Item) -> Markup {
    let src = item.image_uri.as_deref().unwrap_or(PLACEHOLDER_IMAGE);
    html! {
        img class="item-image" src=(src) alt=(item.name);
    }
}

pub fn days_left_label(status: &ExpiryStatus) -> String {
    match status.days_remaining {
        days if days <= 0 => "Expired".to_string(),
        1 => "1 day left".to_string(),
        days => format!("{} days left", days),
    }
}

pub fn alert_label(status: &ExpiryStatus) -> String {
    match status.days_remaining {
        days if days <= 0 => "today!".to_string(),
        1 => "in 1 day.".to_string(),
        days => format!("in {} days.", days),
    }
}

pub fn dashboard_page(theme: Theme, display_name: &str, view: &AggregateView) -> Markup {
    base_layout("Home", theme, html! {
        section class="greeting" {
            h2 { "Hello, " (display_name) }
            @if view.expiring_soon_count > 0 {
                a href="/notifications" class="badge badge-alert" { (view.expiring_soon_count) " alerts" }
            }
        }
        section class="summary" {
            div class="summary-item" {
                span class="summary-number" { (view.total_count) }
                span class="summary-label" { "Total Items" }
            }
            div class="summary-item" {
                span class="summary-number" { (view.expiring_soon_count) }
                span class="summary-label" { "Expiring Soon" }
            }
        }
        section class="expiring-soon" {
            h3 { "Expiring Soon" }
            @if view.urgent_list.is_empty() {
                p class="empty-state" { "Nothing expires in the next " (view.horizon_days) " days." }
            } @else {
                div class="expiry-cards" {
                    @for entry in &view.urgent_list {
                        a class={"expiry-card" @if entry.status.is_expired { " expired" }}
                            href=(format!("/items/{}/edit", entry.item.id)) {
                            (item_image(&entry.item))
                            span class="card-name" { (entry.item.name) }
                            span class="days-left" { (days_left_label(&entry.status)) }
                        }
                    }
                }
            }
        }
        section class="categories" {
            h3 { "Categories" }
            div class="category-grid" {
                @for category in Category::ALL {
                    @let summary = view.category(category);
                    a class="category-btn" href=(format!("/inventory?category={}", category)) {
                        span class="category-name" { (category) }
                        span class="category-count" { (summary.total) }
                        @if summary.urgent > 0 {
                            span class="category-urgent" { (summary.urgent) " expiring" }
                        }
                    }
                }
            }
        }
    })
}

pub fn inventory_page(theme: Theme, filter: &CategoryFilter, rows: &[(Item, Classification)]) -> Markup {
    let title = format!("{} Pantry", filter.label());
    base_layout(&title, theme, html! {
        div class="page-header" {
            h2 { (title) }
            nav class="category-tabs" {
                a href="/inventory?category=All" class={"tab" @if *filter == CategoryFilter::All { " active" }} { "All" }
                @for category in Category::ALL {
                    a href=(format!("/inventory?category={}", category))
                        class={"tab" @if filter.label() == category.as_str() { " active" }} {
                        (category)
                    }
                }
            }
        }
        @if rows.is_empty() {
            div class="empty-state" {
                h3 { "Your pantry is empty" }
                a href="/items/new" class="btn btn-primary" { "Add an item" }
            }
        } @else {
            ul class="inventory-list" {
                @for (item, classification) in rows {
                    li class="inventory-item" data-item-id=(item.id) {
                        (item_image(item))
                        div class="item-details" {
                            span class="item-name" { (item.name) }
                            span class="item-category" { (item.category) }
                            @match classification {
                                Classification::Dated(status) => {
                                    span class={"expiry-text" @if status.is_urgent { " urgent" }} {
                                        "Exp: " (item.expiry_date) " (" (days_left_label(status)) ")"
                                    }
                                },
                                Classification::Unknown => {
                                    span class="expiry-text unknown" { "Expiry date unknown" }
                                },
                            }
                        }
                        div class="item-actions" {
                            a href=(format!("/items/{}/edit", item.id)) class="btn btn-small" { "Edit" }
                            form method="post" action=(format!("/items/{}/delete", item.id)) class="inline-form" {
                                button type="submit" class="btn btn-small btn-danger" { "Delete" }
                            }
                        }
                    }
                }
            }
        }
    })
}

pub fn item_form_page(
    theme: Theme,
    title: &str,
    action: &str,
    form: &ItemForm,
    error: Option<&str>,
) -> Markup {
    let selected = if form.category.is_empty() { Category::Food.as_str() } else { form.category.as_str() };
    base_layout(title, theme, html! {
        div class="form-card" {
            h2 { (title) }
            @if let Some(error) = error {
                div class="error-message" { (error) }
            }
            form method="post" action=(action) {
                div class="form-group" {
                    label for="name" { "Item Name" }
                    input type="text" id="name" name="name" value=(form.name) required;
                }
                div class="form-group" {
                    label for="expiry_date" { "Expiry Date" }
                    input type="date" id="expiry_date" name="expiry_date" value=(form.expiry_date) required;
                }
                div class="form-group" {
                    label for="category" { "Category" }
                    select id="category" name="category" {
                        @for category in Category::ALL {
                            option value=(category) selected[selected == category.as_str()] { (category) }
                        }
                    }
                }
                div class="form-group" {
                    label for="image_uri" { "Photo URL" }
                    input type="url" id="image_uri" name="image_uri" value=(form.image_uri);
                }
                button type="submit" class="btn btn-primary" { "Save Item" }
            }
        }
    })
}

pub fn notifications_page(theme: Theme, view: &AggregateView) -> Markup {
    base_layout("Notifications", theme, html! {
        h2 { "Notifications" }
        @if view.urgent_list.is_empty() {
            div class="empty-state" {
                p { "No expiry alerts. Everything is fresh!" }
            }
        } @else {
            ul class="alert-list" {
                @for entry in &view.urgent_list {
                    li class={"alert" @if entry.status.is_expired { " expired" }} {
                        span class="alert-title" { "Expiry Alert!" }
                        p {
                            "Your " strong { (entry.item.name) } " will expire " (alert_label(&entry.status))
                        }
                    }
                }
            }
        }
        @if !view.unknown_list.is_empty() {
            p class="unknown-note" {
                (view.unknown_list.len()) " item(s) have an unreadable expiry date."
            }
        }
    })
}

pub fn profile_page(theme: Theme, user_id: &str, profile: Option<&Profile>, item_count: usize) -> Markup {
    let display_name = profile
        .and_then(|p| p.display_name.as_deref())
        .unwrap_or(user_id);
    let image = profile
        .and_then(|p| p.profile_image_uri.as_deref())
        .unwrap_or(PLACEHOLDER_IMAGE);

    base_layout("Profile", theme, html! {
        div class="profile-card" {
            img class="profile-image" src=(image) alt="Profile picture";
            h2 { (display_name) }
            p class="item-count" { (item_count) " items tracked" }
        }
        div class="form-card" {
            h3 { "Update Your Details" }
            form method="post" action="/profile" {
                div class="form-group" {
                    label for="display_name" { "Full Name" }
                    input type="text" id="display_name" name="display_name"
                        value=(profile.and_then(|p| p.display_name.as_deref()).unwrap_or(""));
                }
                div class="form-group" {
                    label for="profile_image_uri" { "Profile Picture URL" }
                    input type="url" id="profile_image_uri" name="profile_image_uri"
                        value=(profile.and_then(|p| p.profile_image_uri.as_deref()).unwrap_or(""));
                }
                button type="submit" class="btn btn-primary" { "Update" }
            }
        }
    })
}
