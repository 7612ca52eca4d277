//! Localized plain-text email content.

use shop_core::{Locale, OrderConfirmationEmail, PaymentFailedEmail};
use std::fmt::Write;

/// Rendered subject and body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub text: String,
}

pub fn order_confirmation(email: &OrderConfirmationEmail) -> RenderedEmail {
    let order = &email.order.order;
    let mut lines = String::new();
    for line in &email.order.lines {
        // Writing into a String cannot fail.
        let _ = writeln!(
            lines,
            "- {} x{}: {}",
            line.product.name,
            line.item.quantity,
            money(email.locale, &format!("{:.2}", line.item.total()))
        );
        let description = line.product.localized_description(email.locale);
        if !description.is_empty() {
            let _ = writeln!(lines, "  {}", description);
        }
    }
    let total = money(email.locale, &format!("{:.2}", order.amount));

    match email.locale {
        Locale::En => RenderedEmail {
            subject: format!("Order confirmation {}", order.display_id),
            text: format!(
                "Hi {},\n\n\
                 Thank you for your purchase! Your order {} is confirmed.\n\n\
                 {}\n\
                 Total: {}\n\n\
                 Your downloads are available from your account.\n",
                email.to.name, order.display_id, lines, total
            ),
        },
        Locale::Fr => RenderedEmail {
            subject: format!("Confirmation de commande {}", order.display_id),
            text: format!(
                "Bonjour {},\n\n\
                 Merci pour votre achat ! Votre commande {} est confirmée.\n\n\
                 {}\n\
                 Total : {}\n\n\
                 Vos téléchargements sont disponibles depuis votre compte.\n",
                email.to.name, order.display_id, lines, total
            ),
        },
    }
}

pub fn payment_failed(email: &PaymentFailedEmail) -> RenderedEmail {
    let amount = email
        .amount
        .map(|a| money(email.locale, &format!("{:.2}", a)));

    match email.locale {
        Locale::En => RenderedEmail {
            subject: "Your payment could not be processed".to_string(),
            text: format!(
                "Hi {},\n\n\
                 We could not process your payment{} (reference {}).\n\
                 Reason: {}\n\n\
                 No order was created. You can try again from your cart.\n",
                email.to.name,
                amount.map(|a| format!(" of {}", a)).unwrap_or_default(),
                email.reference,
                email.reason
            ),
        },
        Locale::Fr => RenderedEmail {
            subject: "Votre paiement n'a pas pu être traité".to_string(),
            text: format!(
                "Bonjour {},\n\n\
                 Nous n'avons pas pu traiter votre paiement{} (référence {}).\n\
                 Motif : {}\n\n\
                 Aucune commande n'a été créée. Vous pouvez réessayer depuis votre panier.\n",
                email.to.name,
                amount.map(|a| format!(" de {}", a)).unwrap_or_default(),
                email.reference,
                email.reason
            ),
        },
    }
}

fn money(locale: Locale, amount: &str) -> String {
    match locale {
        Locale::En => format!("${}", amount),
        Locale::Fr => format!("{} $", amount.replace('.', ",")),
    }
}
