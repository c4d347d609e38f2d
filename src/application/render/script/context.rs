use std::{cell::RefCell, rc::Rc};

use rhai::{Engine, Scope};
use tracing::debug;

use super::{
    ScriptOptions,
    bindings::{self, AxesHandle, FigureHandle},
    figure::{Axes, DEFAULT_SPINE_WIDTH, Figure, GridStyle, LineStyle},
    numeric, raster, svg,
};

/// Request-scoped figure/axes pair plus the names bound for user code.
///
/// The pair is released when the context drops, on success and failure alike.
pub(crate) struct PlottingContext {
    figure: Rc<RefCell<Figure>>,
    axes: Rc<RefCell<Axes>>,
    max_operations: u64,
}

impl PlottingContext {
    pub(crate) fn acquire(options: &ScriptOptions) -> Self {
        let figure = Figure::new(options.width_inches, options.height_inches, options.dpi);
        Self {
            figure: Rc::new(RefCell::new(figure)),
            axes: Rc::new(RefCell::new(Axes::default())),
            max_operations: options.max_operations,
        }
    }

    /// Interpreter with the plotting bindings and `np`/`plt` modules registered.
    pub(crate) fn engine(&self) -> Engine {
        let mut engine = Engine::new();
        engine.set_max_operations(self.max_operations);
        engine.on_print(|text| {
            debug!(
                target = "application::render::script",
                output = "print",
                "{text}"
            );
        });
        engine.on_debug(|text, source, position| {
            debug!(
                target = "application::render::script",
                output = "debug",
                source = source.unwrap_or_default(),
                position = %position,
                "{text}"
            );
        });

        bindings::register(&mut engine);
        engine.register_static_module("np", numeric::numeric_module().into());
        engine.register_static_module("plt", numeric::plotting_module().into());
        engine
    }

    /// Fresh scope holding `fig` and `ax`.
    pub(crate) fn scope(&self) -> Scope<'static> {
        let mut scope = Scope::new();
        scope.push("fig", self.figure_handle());
        scope.push("ax", self.axes_handle());
        scope
    }

    pub(crate) fn figure_handle(&self) -> FigureHandle {
        FigureHandle(Rc::clone(&self.figure))
    }

    pub(crate) fn axes_handle(&self) -> AxesHandle {
        AxesHandle(Rc::clone(&self.axes))
    }

    /// Dotted low-alpha grid, uniform spine width, tight layout.
    pub(crate) fn post_process(&self) {
        let mut axes = self.axes.borrow_mut();
        axes.grid = Some(GridStyle {
            style: LineStyle::Dotted,
            width: 0.5,
            alpha: 0.5,
        });
        axes.spine_width = DEFAULT_SPINE_WIDTH;
        self.figure.borrow_mut().tight_layout();
    }

    /// Lay the figure out as SVG and rasterize it to PNG bytes.
    pub(crate) fn serialize(&self) -> Result<Vec<u8>, raster::RasterError> {
        let figure = self.figure.borrow();
        let axes = self.axes.borrow();
        let document = svg::render_document(&figure, &axes);
        raster::rasterize(&document, figure.points_to_px(7.2))
    }

    #[cfg(test)]
    pub(crate) fn artist_count(&self) -> usize {
        self.axes.borrow().artists.len()
    }
}

impl Drop for PlottingContext {
    fn drop(&mut self) {
        if let Ok(mut axes) = self.axes.try_borrow_mut() {
            axes.clear();
        }
        if let Ok(mut figure) = self.figure.try_borrow_mut() {
            figure.clear();
        }
    }
}
