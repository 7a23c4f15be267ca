//! Kitchen, cashier and cancellation tickets
//!
//! Decides what goes on each ticket; layout primitives come from
//! `comanda-printer`.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use comanda_printer::{Station, Ticket, TicketKind, TicketTextBuilder};
use shared::order::format_amount;
use shared::{ExtraItem, Order, OrderItem};

pub struct TicketRenderer {
    width: usize,
    timezone: Tz,
}

impl TicketRenderer {
    /// Common widths: 58mm paper 32 characters, 80mm paper 48
    pub fn new(width: usize, timezone: Tz) -> Self {
        Self { width, timezone }
    }

    /// Kitchen and cashier tickets for a new order
    pub fn order_tickets(&self, order: &Order) -> [Ticket; 2] {
        [self.kitchen(order), self.cashier(order, TicketKind::Order)]
    }

    pub fn kitchen(&self, order: &Order) -> Ticket {
        let mut b = TicketTextBuilder::new(self.width);

        b.center("COCINA");
        self.render_scheduled(&mut b, order);
        b.center(if order.is_pickup() {
            "RETIRA EN LOCAL"
        } else {
            "ENVIO"
        });
        self.render_number(&mut b, order);

        for item in order.items.iter().flatten() {
            b.write_line(&item.description());
            render_modifiers(&mut b, item);
        }
        if order.items.is_none() {
            b.write_line("(sin items)");
        }

        let extras = extras_of(order);
        if !extras.is_empty() {
            b.eq_sep().write_line("EXTRAS:");
            for extra in extras {
                b.write_line(&format!("{}x {}", extra.quantity, extra.name));
            }
        }

        Ticket::new(
            Station::Kitchen,
            TicketKind::Order,
            order.order_number,
            order.customer_name.clone(),
            b.finalize(),
        )
    }

    /// Cashier ticket; `kind` marks reprints
    pub fn cashier(&self, order: &Order, kind: TicketKind) -> Ticket {
        let mut b = TicketTextBuilder::new(self.width);

        b.center("CAJA");
        self.render_scheduled(&mut b, order);
        if kind == TicketKind::Reprint {
            b.center("REIMPRESION");
        }
        self.render_number(&mut b, order);

        b.write_line(&format!("Cliente: {}", order.customer_name));
        if let Some(phone) = order.phone.as_deref().filter(|p| !p.trim().is_empty()) {
            b.write_line(&format!("Tel: {phone}"));
        }
        if let Some(address) = order.delivery_address.as_deref().filter(|a| !a.trim().is_empty()) {
            b.write_line("Entrega:").write_wrapped(2, address);
        }
        b.dash_sep();

        for item in order.items.iter().flatten() {
            match item.price {
                Some(price) => b.line_lr(&item.description(), &money(price)),
                None => b.write_line(&item.description()),
            };
            render_modifiers(&mut b, item);
        }

        let extras = extras_of(order);
        if !extras.is_empty() {
            b.dash_sep().write_line("EXTRAS:");
            for extra in extras {
                let desc = format!("{}x {}", extra.quantity, extra.name);
                match extra.price {
                    Some(price) => b.line_lr(&desc, &money(price)),
                    None => b.write_line(&desc),
                };
            }
        }

        let payment = order.payment();
        b.eq_sep()
            .line_lr("TOTAL:", &money(order.total))
            .write_wrapped(0, &format!("Pago: {}", payment.display_text()));

        if let Some(tendered) = order.cash_tendered
            && !payment.is_digital_only()
            && !order.is_pickup()
        {
            b.dash_sep().write_line(&format!("PAGA CON: {}", money(tendered)));
            if let Some(change) = order.change.filter(|c| *c > 0.0) {
                b.write_line(&format!("VUELTO: {}", money(change)));
            }
        }

        Ticket::new(
            Station::Cashier,
            kind,
            order.order_number,
            order.customer_name.clone(),
            b.finalize(),
        )
    }

    pub fn cancellation(&self, station: Station, order_number: u32, customer_name: &str) -> Ticket {
        let mut b = TicketTextBuilder::new(self.width);
        b.center(match station {
            Station::Kitchen => "COCINA",
            Station::Cashier => "CAJA",
        })
        .eq_sep()
        .center(&format!("PEDIDO #{order_number}"))
        .center("*** CANCELADO ***")
        .eq_sep()
        .write_line(&format!("Cliente: {customer_name}"));

        Ticket::new(
            station,
            TicketKind::Cancel,
            order_number,
            customer_name,
            b.finalize(),
        )
    }

    fn render_scheduled(&self, b: &mut TicketTextBuilder, order: &Order) {
        if let Some(time) = order.scheduled_time.as_deref().filter(|t| !t.trim().is_empty()) {
            b.center(&format!("PROGRAMADO: {time}"));
        }
    }

    /// `PEDIDO #n` and the local creation time between separators
    fn render_number(&self, b: &mut TicketTextBuilder, order: &Order) {
        b.eq_sep()
            .center(&format!("PEDIDO #{}", order.order_number))
            .center(&format_time(order.created_at, self.timezone))
            .eq_sep();
    }
}

fn render_modifiers(b: &mut TicketTextBuilder, item: &OrderItem) {
    if let Some(additions) = item.additions.as_ref().filter(|a| !a.is_empty()) {
        b.write_wrapped(2, &format!("+ {}", additions.join(", ")));
    }
    if let Some(removals) = item.removals.as_ref().filter(|r| !r.is_empty()) {
        b.write_wrapped(2, &format!("- {}", removals.join(", ")));
    }
    if let Some(obs) = item.observations.as_deref().filter(|o| !o.trim().is_empty()) {
        b.write_wrapped(2, &format!("OBS: {obs}"));
    }
}

fn extras_of(order: &Order) -> &[ExtraItem] {
    order.extras.as_deref().unwrap_or_default()
}

fn money(amount: f64) -> String {
    format!("${}", format_amount(amount))
}

fn format_time(at: DateTime<Utc>, tz: Tz) -> String {
    at.with_timezone(&tz).format("%d/%m %H:%M").to_string()
}
