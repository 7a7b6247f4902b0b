use eframe::egui;
use egui_list_callbacks::UseListCallbacksExt as _;

fn main() {
    eframe::run_native(
        "list_callbacks",
        Default::default(),
        Box::new(|_| Box::new(MyApp::default())),
    )
    .unwrap();
}

#[derive(Default)]
struct MyApp {
    clicks: Vec<usize>,
}

impl eframe::App for MyApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::CentralPanel::default().show(ctx, |ui| {
            if self.clicks.is_empty() {
                self.clicks = vec![0; 5];
            }
            let total: usize = self.clicks.iter().sum();
            // captures this frame's total; rows built in earlier frames still see it
            let factory = ui.use_list_callbacks(move |(row,): &(usize,), (): ()| {
                println!("row {row} clicked, {total} clicks so far");
                *row
            });
            for row in 0..self.clicks.len() {
                let on_click = factory.make((row,)).unwrap();
                if ui
                    .button(format!("Row {row}: {}", self.clicks[row]))
                    .clicked()
                {
                    let row = on_click.call(());
                    self.clicks[row] += 1;
                }
            }
            ui.label(format!("Cached callbacks: {}", factory.len()));
        });
    }
}
