use std::collections::HashMap;

use once_cell::sync::Lazy;
use pay_common::Cents;
use regex::Regex;
use serde::Serialize;

use crate::db_types::{Order, OrderItem, ProductSummary};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap()
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailSettings {
    pub from: String,
    pub store_name: String,
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self { from: "orders@localhost".to_string(), store_name: "Storefront".to_string() }
    }
}

/// Picks the confirmation recipient: the address captured at checkout first, then whatever the gateway knows.
pub fn resolve_recipient(order: &Order, gateway_email: Option<&str>) -> Option<String> {
    order
        .customer_email
        .as_deref()
        .into_iter()
        .chain(gateway_email)
        .map(str::trim)
        .find(|e| EMAIL_RE.is_match(e))
        .map(str::to_string)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailLine {
    pub name: String,
    pub image_url: Option<String>,
    pub quantity: i64,
    pub variant: Option<String>,
    pub line_total: Cents,
    pub savings: Option<Cents>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmationEmail {
    pub to: String,
    pub from: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

impl ConfirmationEmail {
    pub fn compose(
        order: &Order,
        items: &[OrderItem],
        products: &[ProductSummary],
        to: String,
        settings: &EmailSettings,
    ) -> Self {
        let lines = email_lines(items, products);
        let subject = format!("{}: order {} confirmed", settings.store_name, order.order_number);
        let text = plain_text_body(order, &lines, settings);
        let html = html_body(order, &lines, settings);
        Self { to, from: settings.from.clone(), subject, html, text }
    }
}

fn email_lines(items: &[OrderItem], products: &[ProductSummary]) -> Vec<EmailLine> {
    let catalogue = products.iter().map(|p| (p.id.as_str(), p)).collect::<HashMap<&str, &ProductSummary>>();
    items
        .iter()
        .map(|item| {
            let product = catalogue.get(item.product_id.as_str());
            let variant = match (&item.size, &item.color) {
                (Some(s), Some(c)) => Some(format!("{s} / {c}")),
                (Some(v), None) | (None, Some(v)) => Some(v.clone()),
                (None, None) => None,
            };
            EmailLine {
                name: product.map(|p| p.name.clone()).unwrap_or_else(|| item.product_id.clone()),
                image_url: product.and_then(|p| p.image_url.clone()),
                quantity: item.quantity,
                variant,
                line_total: item.line_total(),
                savings: item.savings_amount.filter(|s| !s.is_zero()),
            }
        })
        .collect()
}

fn plain_text_body(order: &Order, lines: &[EmailLine], settings: &EmailSettings) -> String {
    let mut body = format!(
        "Thank you for shopping at {}!\n\nWe have received your payment for order {}.\n\n",
        settings.store_name, order.order_number
    );
    for line in lines {
        let variant = line.variant.as_deref().map(|v| format!(" ({v})")).unwrap_or_default();
        body.push_str(&format!("  {} x {}{variant}: {}\n", line.quantity, line.name, line.line_total));
        if let Some(savings) = line.savings {
            body.push_str(&format!("    You saved {savings}\n"));
        }
    }
    if !order.delivery_fee.is_zero() {
        let method = order.delivery_method.as_deref().unwrap_or("Delivery");
        body.push_str(&format!("  {method}: {}\n", order.delivery_fee));
    }
    body.push_str(&format!("\nTotal paid: {}\n", order.total_amount));
    if let Some(reference) = &order.payment_reference {
        body.push_str(&format!("Payment reference: {reference}\n"));
    }
    body
}

fn html_body(order: &Order, lines: &[EmailLine], settings: &EmailSettings) -> String {
    let rows = lines
        .iter()
        .map(|line| {
            let image = line
                .image_url
                .as_deref()
                .map(|url| format!("<img src=\"{}\" alt=\"\" width=\"64\" height=\"64\"/>", escape_html(url)))
                .unwrap_or_default();
            let variant =
                line.variant.as_deref().map(|v| format!("<br/><small>{}</small>", escape_html(v))).unwrap_or_default();
            let savings =
                line.savings.map(|s| format!("<br/><small>You saved {s}</small>")).unwrap_or_default();
            format!(
                "<tr><td>{image}</td><td>{}{variant}</td><td>{}</td><td>{}{savings}</td></tr>",
                escape_html(&line.name),
                line.quantity,
                line.line_total
            )
        })
        .collect::<Vec<String>>()
        .join("\n");
    let delivery = if order.delivery_fee.is_zero() {
        String::default()
    } else {
        let method = escape_html(order.delivery_method.as_deref().unwrap_or("Delivery"));
        format!("<tr><td></td><td>{method}</td><td></td><td>{}</td></tr>", order.delivery_fee)
    };
    format!(
        "<html><body><h1>Thank you for your order!</h1><p>We have received your payment for order \
         <strong>{}</strong> at {}.</p><table>\n{rows}\n{delivery}\n</table><p>Total paid: <strong>{}</strong></p>\
         </body></html>",
        escape_html(&order.order_number),
        escape_html(&settings.store_name),
        order.total_amount
    )
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
