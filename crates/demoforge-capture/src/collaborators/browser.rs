// crates/demoforge-capture/src/collaborators/browser.rs
//
// The browser driver contract and its two implementations: a real Chrome
// DevTools Protocol driver used during recording, and a recursive no-op
// stub used by the narration preprocessor's dry run (see narration.rs).
//
// Mirrors the sync, blocking-call style the rest of this codebase uses for
// external processes (see demoforge-capture's silence/audio collaborators):
// no async runtime is pulled in just for this.

use demoforge_core::error::{DemoforgeError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
}

#[derive(Clone, Copy, Debug)]
pub struct ColorScheme {
    pub dark: bool,
}

pub trait BrowserDriver: Send {
    fn launch(
        &mut self,
        viewport_w: u32,
        viewport_h: u32,
        device_scale_factor: f64,
        locale: &str,
        timezone: &str,
        color_scheme: ColorScheme,
    ) -> Result<()>;

    fn goto(&mut self, url: &str) -> Result<()>;
    fn screenshot(&mut self) -> Result<Vec<u8>>;
    fn click(&mut self, selector: &str) -> Result<()>;
    fn fill(&mut self, selector: &str, value: &str) -> Result<()>;
    fn hover(&mut self, selector: &str) -> Result<()>;
    fn press(&mut self, selector: &str, key: &str) -> Result<()>;
    fn dblclick(&mut self, selector: &str) -> Result<()>;
    fn bounding_box(&mut self, selector: &str) -> Result<Option<BoundingBox>>;
    fn inject_css(&mut self, css: &str) -> Result<()>;
    fn remove_injected(&mut self) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}

fn driver_failure(action: &str, selector: Option<&str>, reason: impl std::fmt::Display) -> DemoforgeError {
    DemoforgeError::DriverFailure {
        action: action.to_string(),
        url: None,
        selector: selector.map(str::to_string),
        reason: reason.to_string(),
    }
}

/// Chrome DevTools Protocol driver used for the actual recording pass.
pub struct HeadlessChromeDriver {
    browser: Option<headless_chrome::Browser>,
    tab: Option<std::sync::Arc<headless_chrome::Tab>>,
}

impl Default for HeadlessChromeDriver {
    fn default() -> Self {
        HeadlessChromeDriver { browser: None, tab: None }
    }
}

impl HeadlessChromeDriver {
    pub fn new() -> HeadlessChromeDriver {
        HeadlessChromeDriver::default()
    }

    fn tab(&self) -> Result<&std::sync::Arc<headless_chrome::Tab>> {
        self.tab
            .as_ref()
            .ok_or_else(|| driver_failure("tab-access", None, "browser not launched"))
    }
}

impl BrowserDriver for HeadlessChromeDriver {
    fn launch(
        &mut self,
        viewport_w: u32,
        viewport_h: u32,
        device_scale_factor: f64,
        _locale: &str,
        _timezone: &str,
        _color_scheme: ColorScheme,
    ) -> Result<()> {
        let launch_options = headless_chrome::LaunchOptionsBuilder::default()
            .window_size(Some((viewport_w, viewport_h)))
            .build()
            .map_err(|e| driver_failure("launch", None, e))?;
        let browser = headless_chrome::Browser::new(launch_options)
            .map_err(|e| driver_failure("launch", None, e))?;
        let tab = browser
            .new_tab()
            .map_err(|e| driver_failure("new-tab", None, e))?;
        let _ = device_scale_factor; // DPR stays 1 during capture; upscaling is the encoder's job.
        self.browser = Some(browser);
        self.tab = Some(tab);
        Ok(())
    }

    fn goto(&mut self, url: &str) -> Result<()> {
        self.tab()?
            .navigate_to(url)
            .and_then(|t| t.wait_until_navigated())
            .map(|_| ())
            .map_err(|e| DemoforgeError::DriverFailure {
                action: "navigate".into(),
                url: Some(url.into()),
                selector: None,
                reason: e.to_string(),
            })
    }

    fn screenshot(&mut self) -> Result<Vec<u8>> {
        self.tab()?
            .capture_screenshot(
                headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption::Jpeg,
                Some(85),
                None,
                true,
            )
            .map_err(|e| driver_failure("screenshot", None, e))
    }

    fn click(&mut self, selector: &str) -> Result<()> {
        self.tab()?
            .find_element(selector)
            .and_then(|el| el.click())
            .map(|_| ())
            .map_err(|e| driver_failure("click", Some(selector), e))
    }

    fn fill(&mut self, selector: &str, value: &str) -> Result<()> {
        let tab = self.tab()?;
        let element = tab
            .find_element(selector)
            .map_err(|e| driver_failure("fill", Some(selector), e))?;
        element.click().map_err(|e| driver_failure("fill", Some(selector), e))?;
        for ch in value.chars() {
            tab.press_key(&ch.to_string())
                .map_err(|e| driver_failure("fill", Some(selector), e))?;
            std::thread::sleep(std::time::Duration::from_millis(30));
        }
        Ok(())
    }

    fn hover(&mut self, selector: &str) -> Result<()> {
        self.tab()?
            .find_element(selector)
            .and_then(|el| el.move_mouse_over())
            .map(|_| ())
            .map_err(|e| driver_failure("hover", Some(selector), e))
    }

    fn press(&mut self, selector: &str, key: &str) -> Result<()> {
        let tab = self.tab()?;
        tab.find_element(selector)
            .map_err(|e| driver_failure("press", Some(selector), e))?;
        tab.press_key(key).map_err(|e| driver_failure("press", Some(selector), e))?;
        Ok(())
    }

    fn dblclick(&mut self, selector: &str) -> Result<()> {
        self.click(selector)?;
        self.click(selector)
    }

    fn bounding_box(&mut self, selector: &str) -> Result<Option<BoundingBox>> {
        let el = self.tab()?.find_element(selector);
        match el {
            Ok(el) => {
                let b = el
                    .get_box_model()
                    .map_err(|e| driver_failure("bounding-box", Some(selector), e))?;
                Ok(Some(BoundingBox {
                    x: b.content.top_left().x as i32,
                    y: b.content.top_left().y as i32,
                    w: b.width as u32,
                    h: b.height as u32,
                }))
            }
            Err(_) => Ok(None),
        }
    }

    fn inject_css(&mut self, css: &str) -> Result<()> {
        let script = format!(
            "(() => {{ const s = document.createElement('style'); s.id = 'demoforge-slide'; s.textContent = {css:?}; document.head.appendChild(s); }})()"
        );
        self.tab()?
            .evaluate(&script, false)
            .map(|_| ())
            .map_err(|e| driver_failure("inject-css", None, e))
    }

    fn remove_injected(&mut self) -> Result<()> {
        let script = "(() => { const s = document.getElementById('demoforge-slide'); if (s) s.remove(); })()";
        self.tab()?
            .evaluate(script, false)
            .map(|_| ())
            .map_err(|e| driver_failure("remove-injected", None, e))
    }

    fn close(&mut self) -> Result<()> {
        self.tab = None;
        self.browser = None;
        Ok(())
    }
}

/// A recursive no-op: every method succeeds with an inert default value.
/// Used by the narration preprocessor's dry run so the scenario script can
/// run to completion without ever touching a real browser.
#[derive(Default)]
pub struct NoOpDriver;

impl BrowserDriver for NoOpDriver {
    fn launch(&mut self, _: u32, _: u32, _: f64, _: &str, _: &str, _: ColorScheme) -> Result<()> {
        Ok(())
    }
    fn goto(&mut self, _: &str) -> Result<()> {
        Ok(())
    }
    fn screenshot(&mut self) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }
    fn click(&mut self, _: &str) -> Result<()> {
        Ok(())
    }
    fn fill(&mut self, _: &str, _: &str) -> Result<()> {
        Ok(())
    }
    fn hover(&mut self, _: &str) -> Result<()> {
        Ok(())
    }
    fn press(&mut self, _: &str, _: &str) -> Result<()> {
        Ok(())
    }
    fn dblclick(&mut self, _: &str) -> Result<()> {
        Ok(())
    }
    fn bounding_box(&mut self, _: &str) -> Result<Option<BoundingBox>> {
        Ok(None)
    }
    fn inject_css(&mut self, _: &str) -> Result<()> {
        Ok(())
    }
    fn remove_injected(&mut self) -> Result<()> {
        Ok(())
    }
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_op_driver_never_fails() {
        let mut d = NoOpDriver;
        assert!(d.goto("https://example.com").is_ok());
        assert!(d.click("#anything").is_ok());
        assert_eq!(d.bounding_box("#anything").unwrap(), None);
        assert!(d.screenshot().unwrap().is_empty());
    }
}
