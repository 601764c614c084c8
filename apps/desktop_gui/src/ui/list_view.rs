//! The reorderable list: rows are painted at their slot plus the engine's
//! spring offset, and the lifted row floats above the rest.

use eframe::egui;
use reorder_core::{ItemFrame, ReorderList, Viewport};
use shared::domain::{ItemId, OrderedItem};

const ROW_GAP: f32 = 4.0;
const ROW_ROUNDING: u8 = 6;

pub enum RowAction {
    /// Primary button is down on a row; may become a drag after the hold.
    Press { id: ItemId, y: f32, now: f64 },
    SetDone { id: ItemId, done: bool },
    Delete { id: ItemId },
}

/// Active filters. Reordering a filtered subset would re-key hidden records,
/// so drag is only offered on the full list.
pub struct RowFilter<'a> {
    pub tag: &'a str,
    pub hide_done: bool,
}

impl RowFilter<'_> {
    pub fn is_active(&self) -> bool {
        !self.tag.is_empty() || self.hide_done
    }

    pub fn matches(&self, item: &OrderedItem) -> bool {
        if self.hide_done && item.done {
            return false;
        }
        self.tag.is_empty() || item.tag.as_deref() == Some(self.tag)
    }
}

struct Row {
    frame: ItemFrame,
    title: String,
    tag: Option<String>,
    done: bool,
}

pub fn show(
    ui: &mut egui::Ui,
    list: &mut ReorderList,
    filter: &RowFilter<'_>,
    dragging: bool,
) -> Vec<RowAction> {
    if list.sequence().is_empty() {
        ui.centered_and_justified(|ui| {
            ui.label(egui::RichText::new("Nothing to do. Add an item above.").weak());
        });
        return Vec::new();
    }
    if filter.is_active() && !dragging {
        return show_filtered(ui, list, filter);
    }

    let rows: Vec<Row> = list
        .frames()
        .into_iter()
        .filter_map(|frame| {
            let item = list.sequence().get(frame.index)?;
            Some(Row {
                frame,
                title: item.title.clone(),
                tag: item.tag.clone(),
                done: item.done,
            })
        })
        .collect();
    let total_height = list
        .geometry()
        .layout(list.sequence())
        .last()
        .map_or(0.0, |slot| slot.bottom());
    let visuals = ui.visuals().clone();
    let mut actions = Vec::new();

    egui::ScrollArea::vertical()
        .id_salt("todo_list_scroll")
        .auto_shrink([false, false])
        .drag_to_scroll(!dragging)
        .show_viewport(ui, |ui, viewport| {
            list.set_viewport(Some(Viewport::new(viewport.min.y, viewport.height())));

            let width = ui.available_width();
            let (content, _) =
                ui.allocate_exact_size(egui::vec2(width, total_height), egui::Sense::hover());
            let (now, pointer_y) =
                ui.input(|i| (i.time, i.pointer.interact_pos().map(|pos| pos.y)));

            for row in rows.iter().filter(|row| !row.frame.is_dragging) {
                let id = row.frame.id;
                let rect = row_rect(content, width, &row.frame);
                if !ui.is_rect_visible(rect) {
                    continue;
                }

                let response =
                    ui.interact(rect, ui.id().with(("todo_row", id.0)), egui::Sense::click());
                if !dragging && response.is_pointer_button_down_on() {
                    if let Some(y) = pointer_y {
                        actions.push(RowAction::Press { id, y, now });
                    }
                }
                paint_row(ui.painter(), rect, row, response.hovered(), &visuals);

                let mut done = row.done;
                let check_rect = egui::Rect::from_center_size(
                    rect.left_center() + egui::vec2(20.0, 0.0),
                    egui::vec2(20.0, 20.0),
                );
                if ui
                    .put(check_rect, egui::Checkbox::without_text(&mut done))
                    .changed()
                {
                    actions.push(RowAction::SetDone { id, done });
                }
                let delete_rect = egui::Rect::from_center_size(
                    rect.right_center() - egui::vec2(20.0, 0.0),
                    egui::vec2(24.0, 24.0),
                );
                if ui
                    .put(delete_rect, egui::Button::new("🗑").frame(false))
                    .on_hover_text("Delete")
                    .clicked()
                {
                    actions.push(RowAction::Delete { id });
                }
            }

            if let Some(row) = rows.iter().find(|row| row.frame.is_dragging) {
                let rect = row_rect(content, width, &row.frame);
                let painter = ui.ctx().layer_painter(egui::LayerId::new(
                    egui::Order::Tooltip,
                    ui.id().with("lifted_row"),
                ));
                painter.add(
                    egui::Shadow {
                        offset: [0, 6],
                        blur: 16,
                        spread: 0,
                        color: egui::Color32::from_black_alpha(90),
                    }
                    .as_shape(rect, egui::CornerRadius::same(ROW_ROUNDING)),
                );
                paint_row(&painter, rect.expand(2.0), row, true, &visuals);
            }
        });

    actions
}

fn show_filtered(
    ui: &mut egui::Ui,
    list: &ReorderList,
    filter: &RowFilter<'_>,
) -> Vec<RowAction> {
    let mut actions = Vec::new();
    let matching: Vec<&OrderedItem> = list
        .sequence()
        .items()
        .iter()
        .filter(|item| filter.matches(item))
        .collect();

    ui.small(egui::RichText::new("Clear the filters to reorder.").weak());
    if matching.is_empty() {
        ui.centered_and_justified(|ui| {
            ui.label(egui::RichText::new("No items match.").weak());
        });
        return actions;
    }

    egui::ScrollArea::vertical()
        .id_salt("todo_filtered_scroll")
        .auto_shrink([false, false])
        .show(ui, |ui| {
            for item in matching {
                ui.horizontal(|ui| {
                    let mut done = item.done;
                    if ui.checkbox(&mut done, &item.title).changed() {
                        actions.push(RowAction::SetDone { id: item.id, done });
                    }
                    if let Some(tag) = &item.tag {
                        ui.label(egui::RichText::new(format!("#{tag}")).weak().small());
                    }
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.small_button("🗑").on_hover_text("Delete").clicked() {
                            actions.push(RowAction::Delete { id: item.id });
                        }
                    });
                });
            }
        });
    actions
}

fn row_rect(content: egui::Rect, width: f32, frame: &ItemFrame) -> egui::Rect {
    egui::Rect::from_min_size(
        egui::pos2(content.left(), content.top() + frame.drawn_top()),
        egui::vec2(width, (frame.height - ROW_GAP).max(1.0)),
    )
}

fn paint_row(
    painter: &egui::Painter,
    rect: egui::Rect,
    row: &Row,
    highlighted: bool,
    visuals: &egui::Visuals,
) {
    let fill = if highlighted {
        visuals.widgets.hovered.weak_bg_fill
    } else {
        visuals.widgets.inactive.weak_bg_fill
    };
    painter.rect_filled(rect, egui::CornerRadius::same(ROW_ROUNDING), fill);

    let text_color = if row.done {
        visuals.weak_text_color()
    } else {
        visuals.text_color()
    };
    painter.text(
        rect.left_center() + egui::vec2(40.0, 0.0),
        egui::Align2::LEFT_CENTER,
        &row.title,
        egui::FontId::proportional(15.0),
        text_color,
    );
    if let Some(tag) = &row.tag {
        painter.text(
            rect.right_center() - egui::vec2(44.0, 0.0),
            egui::Align2::RIGHT_CENTER,
            format!("#{tag}"),
            egui::FontId::proportional(12.0),
            visuals.weak_text_color(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::RowFilter;
    use shared::domain::{ItemId, OrderKey, OrderedItem};

    fn item(done: bool, tag: Option<&str>) -> OrderedItem {
        OrderedItem {
            id: ItemId(1),
            order_key: OrderKey(0),
            title: "x".to_string(),
            tag: tag.map(str::to_string),
            done,
            created_at: Default::default(),
        }
    }

    #[test]
    fn empty_filter_is_inactive_and_matches_everything() {
        let filter = RowFilter {
            tag: "",
            hide_done: false,
        };
        assert!(!filter.is_active());
        assert!(filter.matches(&item(true, None)));
    }

    #[test]
    fn tag_and_done_filters_combine() {
        let filter = RowFilter {
            tag: "work",
            hide_done: true,
        };
        assert!(filter.is_active());
        assert!(filter.matches(&item(false, Some("work"))));
        assert!(!filter.matches(&item(true, Some("work"))));
        assert!(!filter.matches(&item(false, Some("home"))));
        assert!(!filter.matches(&item(false, None)));
    }
}
