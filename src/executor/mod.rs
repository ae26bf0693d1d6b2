pub mod chrome;
pub mod dispatcher;
pub mod driver;

pub use chrome::ChromeDriver;
pub use dispatcher::{ActionExecutor, DirectiveDispatcher};
pub use driver::{ScrollDirection, UiDriver};
