use crate::{factory::CallbackFactory, key::IntoKey};

pub trait UseListCallbacksExt {
    /// Use a callback factory in the context of a widget with the given id.
    fn use_list_callbacks_as<A, C, R>(
        &mut self,
        id: egui::Id,
        callback: impl Fn(&A, C) -> R + Send + Sync + 'static,
    ) -> CallbackFactory<A, C, R>
    where
        A: IntoKey + Clone + Send + Sync + 'static,
        C: 'static,
        R: 'static;

    fn use_list_callbacks<A, C, R>(
        &mut self,
        callback: impl Fn(&A, C) -> R + Send + Sync + 'static,
    ) -> CallbackFactory<A, C, R>
    where
        A: IntoKey + Clone + Send + Sync + 'static,
        C: 'static,
        R: 'static;
}

const HOOK_CONTEXT_SALT: &str = "egui_list_callbacks::hook_context";

/// Counts the hooks used by a widget in the current frame, so that each call site gets its
/// own factory. Call order must be the same in every frame.
#[derive(Debug, Default, Clone, Copy)]
struct HookContext {
    frame: u64,
    next_hook_index: usize,
}

impl HookContext {
    #[inline]
    fn next_index(&mut self, frame: u64) -> usize {
        if frame != self.frame {
            self.frame = frame;
            self.next_hook_index = 0;
        }
        let index = self.next_hook_index;
        self.next_hook_index += 1;
        index
    }
}

impl UseListCallbacksExt for egui::Ui {
    #[inline]
    fn use_list_callbacks_as<A, C, R>(
        &mut self,
        id: egui::Id,
        callback: impl Fn(&A, C) -> R + Send + Sync + 'static,
    ) -> CallbackFactory<A, C, R>
    where
        A: IntoKey + Clone + Send + Sync + 'static,
        C: 'static,
        R: 'static,
    {
        let frame = self.ctx().frame_nr();
        let hook_index = self.data_mut(|data| {
            data.get_temp_mut_or_default::<HookContext>(id.with(HOOK_CONTEXT_SALT))
                .next_index(frame)
        });
        let id = id.with(("egui_list_callbacks::use_list_callbacks", hook_index));
        let stored = self.data_mut(|data| data.get_temp::<CallbackFactory<A, C, R>>(id));
        match stored {
            Some(factory) => {
                factory.set_callback(callback);
                factory
            }
            None => {
                let factory = CallbackFactory::new(callback);
                self.data_mut(|data| data.insert_temp(id, factory.clone()));
                factory
            }
        }
    }

    /// Returns a factory of per-item callbacks for this widget. Calling `make` with equal
    /// factory arguments gives the same callback in every frame, and that callback always
    /// runs the closure passed in the latest frame.
    ///
    /// Factory arguments must keep the same length for the lifetime of the widget. Several
    /// hooks in one widget are told apart by call order, like any other hook, so they must
    /// be called in the same order every frame.
    ///
    /// # Example
    /// ```
    /// let ctx = egui::Context::default();
    /// let _ = ctx.run(Default::default(), |ctx| {
    ///     egui::Area::new("test").show(ctx, |ui| {
    ///         use egui_list_callbacks::UseListCallbacksExt as _;
    ///         let factory = ui.use_list_callbacks(|(row,): &(usize,), (): ()| *row * 2);
    ///         let on_click = factory.make((21,)).unwrap();
    ///         assert_eq!(on_click.call(()), 42);
    ///     });
    /// });
    /// ```
    #[inline]
    fn use_list_callbacks<A, C, R>(
        &mut self,
        callback: impl Fn(&A, C) -> R + Send + Sync + 'static,
    ) -> CallbackFactory<A, C, R>
    where
        A: IntoKey + Clone + Send + Sync + 'static,
        C: 'static,
        R: 'static,
    {
        let id = self.id();
        self.use_list_callbacks_as(id, callback)
    }
}

#[cfg(test)]
fn run_frame(ctx: &egui::Context, add_contents: impl FnOnce(&mut egui::Ui)) {
    let _ = ctx.run(Default::default(), |ctx| {
        egui::Area::new("test").show(ctx, add_contents);
    });
}

#[test]
fn test_callbacks_are_stable_across_frames() {
    use crate::factory::Callback;

    let ctx = egui::Context::default();
    let mut handed_out: Vec<Callback<(), String>> = Vec::new();
    for version in 0..3 {
        run_frame(&ctx, |ui| {
            let factory = ui.use_list_callbacks(move |(item,): &(&'static str,), (): ()| {
                format!("v{version}:{item}")
            });
            handed_out.push(factory.make(("row",)).unwrap());
        });
    }
    assert!(handed_out[0].ptr_eq(&handed_out[1]));
    assert!(handed_out[1].ptr_eq(&handed_out[2]));
    // the oldest callback runs the closure of the latest frame
    assert_eq!(handed_out[0].call(()), "v2:row");
}

#[test]
fn test_separate_ids_are_independent() {
    let ctx = egui::Context::default();
    run_frame(&ctx, |ui| {
        let a = ui.use_list_callbacks_as(egui::Id::new("a"), |(n,): &(i32,), (): ()| *n);
        let b = ui.use_list_callbacks_as(egui::Id::new("b"), |(n,): &(i32,), (): ()| -*n);
        let from_a = a.make((1,)).unwrap();
        let from_b = b.make((1,)).unwrap();
        assert!(!from_a.ptr_eq(&from_b));
        assert_eq!(from_a.call(()), 1);
        assert_eq!(from_b.call(()), -1);
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
    });
}

#[test]
fn test_two_hooks_in_one_ui_keep_their_own_closures() {
    let ctx = egui::Context::default();
    let mut handed_out = Vec::new();
    for version in 0..2 {
        run_frame(&ctx, |ui| {
            let a = ui.use_list_callbacks(move |(n,): &(i32,), (): ()| {
                format!("list_a{version}:{n}")
            });
            let b = ui.use_list_callbacks(move |(n,): &(i32,), (): ()| {
                format!("list_b{version}:{n}")
            });
            let from_a = a.make((1,)).unwrap();
            let from_b = b.make((1,)).unwrap();
            assert!(!from_a.ptr_eq(&from_b));
            assert_eq!(from_a.call(()), format!("list_a{version}:1"));
            assert_eq!(from_b.call(()), format!("list_b{version}:1"));
            handed_out.push((from_a, from_b));
        });
    }
    // each call site keeps its factory across frames
    assert!(handed_out[0].0.ptr_eq(&handed_out[1].0));
    assert!(handed_out[0].1.ptr_eq(&handed_out[1].1));
    assert_eq!(handed_out[0].0.call(()), "list_a1:1");
}

#[test]
fn test_hook_index_resets_each_frame() {
    let mut context = HookContext::default();
    assert_eq!(context.next_index(1), 0);
    assert_eq!(context.next_index(1), 1);
    assert_eq!(context.next_index(2), 0);
}
